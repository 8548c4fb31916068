//! Reuse decisions between consecutive render trees.
//!
//! While a new tree is being built, every component is paired with the
//! component of the previous tree that has the same id. There is no
//! positional fallback: a component whose id is new is always created from
//! scratch.
//!
//! Decisions are made top-down. A component that must re-measure
//! invalidates the cached layouts of nested trees below it, while ordinary
//! descendants are still judged on their own inputs.

mod measure_spec;

pub use measure_spec::{has_compatible_size_specs, is_spec_compatible};

use crate::model::{MeasuredNode, OutputId, SizeSpec};
use crate::render_tree::RenderTree;
use std::collections::{HashMap, HashSet};

/// Inputs of a component's reuse decision, kept on the tree that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRecord {
    /// Component id (the id of its content output).
    pub id: OutputId,
    /// Width constraint it was measured under.
    pub width_spec: SizeSpec,
    /// Height constraint it was measured under.
    pub height_spec: SizeSpec,
    /// Measured width.
    pub measured_width: i32,
    /// Measured height.
    pub measured_height: i32,
    /// Digest of props and state.
    pub props_digest: u64,
    /// Root of a nested tree.
    pub nested_tree: bool,
}

impl DiffRecord {
    /// Record for `node` under component id `id`.
    pub fn from_node(id: OutputId, node: &MeasuredNode) -> Self {
        Self {
            id,
            width_spec: node.width_spec,
            height_spec: node.height_spec,
            measured_width: node.measured_width(),
            measured_height: node.measured_height(),
            props_digest: node.props_digest,
            nested_tree: node.nested_tree,
        }
    }

    /// Whether this measurement is still valid under `next`'s constraints.
    pub fn is_measurement_compatible(&self, next: &DiffRecord) -> bool {
        has_compatible_size_specs(
            self.width_spec,
            self.height_spec,
            next.width_spec,
            next.height_spec,
            self.measured_width,
            self.measured_height,
        )
    }
}

/// Component-owned predicate deciding whether mounted content must be rebound.
pub trait ShouldUpdate: Send + Sync {
    /// True if content bound for `previous` cannot be reused for `next`.
    fn should_update(&self, previous: &DiffRecord, next: &DiffRecord) -> bool;
}

/// Rebinds whenever the props digest changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropsDigestPredicate;

impl ShouldUpdate for PropsDigestPredicate {
    fn should_update(&self, previous: &DiffRecord, next: &DiffRecord) -> bool {
        previous.props_digest != next.props_digest
    }
}

/// Outcome of pairing one component with the previous tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseDecision {
    /// No component with this id existed before.
    Create,
    /// Matched, but the old measurement is not valid under the new constraints.
    Remeasure,
    /// Measurement reused; mounted content must be updated.
    ReuseMeasurement,
    /// Measurement and mounted content reused as is.
    ReuseMounted,
}

impl ReuseDecision {
    /// The previous measurement stays valid.
    pub fn reuses_measurement(self) -> bool {
        matches!(self, Self::ReuseMeasurement | Self::ReuseMounted)
    }

    /// Mounted content can be kept without an update.
    pub fn reuses_mount_content(self) -> bool {
        matches!(self, Self::ReuseMounted)
    }
}

/// Reuse decisions of one build against its previous tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    decisions: HashMap<OutputId, ReuseDecision>,
    orphaned: Vec<OutputId>,
}

impl DiffOutcome {
    /// Decision for the component with this id.
    pub fn decision(&self, component: OutputId) -> Option<ReuseDecision> {
        self.decisions.get(&component).copied()
    }

    /// Outputs of the previous tree that are gone, in previous mount order.
    pub fn orphaned(&self) -> &[OutputId] {
        &self.orphaned
    }

    /// Number of components that received `decision`.
    pub fn count(&self, decision: ReuseDecision) -> usize {
        self.decisions.values().filter(|&&d| d == decision).count()
    }

    /// Number of decided components.
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// True if no component was decided.
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Every component reused its mounted content and nothing was orphaned.
    pub fn is_full_reuse(&self) -> bool {
        self.orphaned.is_empty()
            && self
                .decisions
                .values()
                .all(|decision| decision.reuses_mount_content())
    }
}

/// Top-down pairing of a tree under construction with its predecessor.
pub struct DiffEngine<'p> {
    previous: Option<&'p RenderTree>,
    predicate: &'p dyn ShouldUpdate,
    decisions: HashMap<OutputId, ReuseDecision>,
}

impl<'p> DiffEngine<'p> {
    /// Engine pairing against `previous` (none on the first pass).
    pub fn new(previous: Option<&'p RenderTree>, predicate: &'p dyn ShouldUpdate) -> Self {
        Self {
            previous,
            predicate,
            decisions: HashMap::new(),
        }
    }

    /// Decide reuse for one component.
    ///
    /// `ancestor_remeasured` is true when some ancestor received
    /// [`ReuseDecision::Remeasure`]; nested-tree roots then re-measure too.
    pub fn decide(&mut self, next: &DiffRecord, ancestor_remeasured: bool) -> ReuseDecision {
        let previous = self
            .previous
            .and_then(|tree| tree.diff_records().get(&next.id));
        let decision = match previous {
            None => ReuseDecision::Create,
            Some(_) if ancestor_remeasured && next.nested_tree => ReuseDecision::Remeasure,
            Some(old) if !old.is_measurement_compatible(next) => ReuseDecision::Remeasure,
            Some(old) if self.predicate.should_update(old, next) => {
                ReuseDecision::ReuseMeasurement
            }
            Some(_) => ReuseDecision::ReuseMounted,
        };
        self.decisions.insert(next.id, decision);
        decision
    }

    /// Close the diff once every output id of the new tree is known.
    pub fn finish(self, current: &HashSet<OutputId>) -> DiffOutcome {
        let orphaned = self
            .previous
            .map(|tree| {
                tree.outputs()
                    .iter()
                    .map(|output| output.id)
                    .filter(|id| !current.contains(id))
                    .collect()
            })
            .unwrap_or_default();
        DiffOutcome {
            decisions: self.decisions,
            orphaned,
        }
    }
}
