//! Flattened, host-aware render trees.
//!
//! A [`RenderTree`] is the immutable result of one layout pass. Its outputs
//! are stored in mount order: depth-first, every host before the outputs it
//! contains. Index 0 is always the root host.
//!
//! # Auxiliary orderings
//!
//! `by_top` and `by_bottom` hold output indices sorted by `bounds.top` and
//! `bounds.bottom`. Both come from a stable sort, so outputs with equal
//! edges keep mount order. The incremental mount engine walks these
//! orderings with two cursors instead of scanning every output.
//!
//! # Host subtrees
//!
//! Because hosts precede their content, the outputs hosted (directly or
//! transitively) by the host at index `h` form the contiguous range
//! `h + 1..subtree_end(h)`.

mod affinity;
mod builder;

pub use affinity::{AffinityGroup, AffinityGroups, AffinityMember};
pub use builder::{build_render_tree, RenderTreeBuilder};

use crate::diff::{DiffOutcome, DiffRecord};
use crate::identity::GlobalKey;
use crate::model::{IdentityConflict, OutputId, OutputKind, Rect, SizeSpec, TransitionId};
use std::collections::HashMap;
use std::ops::Range;

/// One renderable unit of a render tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    /// Stable id.
    pub id: OutputId,
    /// Role within its component.
    pub kind: OutputKind,
    /// Bounds in root coordinates.
    pub bounds: Rect,
    /// Enclosing host; `None` only for the root host.
    pub host_id: Option<OutputId>,
    /// Index of the enclosing host; `None` only for the root host.
    pub host_index: Option<usize>,
    /// Mounted regardless of the visible rectangle.
    pub exclude_from_incremental_mount: bool,
    /// Transition id after conflict resolution.
    pub transition_id: Option<TransitionId>,
    /// Allocator that creates the mount content.
    pub allocator: Option<String>,
    /// Id of the owning component, used to look up its reuse decision.
    pub component_id: OutputId,
    /// Name of the owning component.
    pub component: String,
    /// Global key of the owning component.
    pub global_key: GlobalKey,
}

/// A working range registration collected while building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRegistration {
    /// Range name.
    pub name: String,
    /// Global key of the registering component.
    pub owner: GlobalKey,
}

/// Immutable result of one layout pass.
#[derive(Debug)]
pub struct RenderTree {
    outputs: Vec<RenderOutput>,
    by_top: Vec<usize>,
    by_bottom: Vec<usize>,
    positions: HashMap<OutputId, usize>,
    subtree_end: Vec<usize>,
    affinity: AffinityGroups,
    diagnostics: Vec<IdentityConflict>,
    diff_records: HashMap<OutputId, DiffRecord>,
    diff: DiffOutcome,
    ranges: Vec<RangeRegistration>,
    root_bounds: Rect,
    width_spec: SizeSpec,
    height_spec: SizeSpec,
}

impl RenderTree {
    /// Outputs in mount order.
    pub fn outputs(&self) -> &[RenderOutput] {
        &self.outputs
    }

    /// Output at mount-order `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn output(&self, index: usize) -> &RenderOutput {
        &self.outputs[index]
    }

    /// Number of outputs, root host included.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Always false: every tree holds at least the root host.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// The root host.
    pub fn root(&self) -> &RenderOutput {
        &self.outputs[0]
    }

    /// Indices sorted by `bounds.top`, ties in mount order.
    pub fn by_top(&self) -> &[usize] {
        &self.by_top
    }

    /// Indices sorted by `bounds.bottom`, ties in mount order.
    pub fn by_bottom(&self) -> &[usize] {
        &self.by_bottom
    }

    /// Mount-order index of the output with this id.
    pub fn position_of(&self, id: OutputId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Output with this id.
    pub fn get(&self, id: OutputId) -> Option<&RenderOutput> {
        self.position_of(id).map(|index| &self.outputs[index])
    }

    /// End (exclusive) of the outputs hosted by `index`. For outputs that are
    /// not hosts this is `index + 1`.
    pub fn subtree_end(&self, index: usize) -> usize {
        self.subtree_end[index]
    }

    /// Outputs hosted directly or transitively by `index`.
    pub fn descendants(&self, index: usize) -> Range<usize> {
        index + 1..self.subtree_end[index]
    }

    /// Chain of host indices from `index`'s host up to the root.
    pub fn host_chain(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.outputs[index].host_index, move |&host| {
            self.outputs[host].host_index
        })
    }

    /// Affinity groups keyed by transition id.
    pub fn affinity_groups(&self) -> &AffinityGroups {
        &self.affinity
    }

    /// Identity conflicts resolved while building.
    pub fn diagnostics(&self) -> &[IdentityConflict] {
        &self.diagnostics
    }

    /// Per-component inputs of the next pass's reuse decisions.
    pub fn diff_records(&self) -> &HashMap<OutputId, DiffRecord> {
        &self.diff_records
    }

    /// Every id this tree references: output ids plus component ids of
    /// components that emitted no content.
    pub fn live_ids(&self) -> impl Iterator<Item = OutputId> + '_ {
        self.outputs
            .iter()
            .map(|output| output.id)
            .chain(self.diff_records.keys().copied())
    }

    /// Reuse decisions against the previous tree.
    pub fn diff_outcome(&self) -> &DiffOutcome {
        &self.diff
    }

    /// Working range registrations in traversal order.
    pub fn range_registrations(&self) -> &[RangeRegistration] {
        &self.ranges
    }

    /// Width of the measured root.
    pub fn width(&self) -> i32 {
        self.root_bounds.width()
    }

    /// Height of the measured root.
    pub fn height(&self) -> i32 {
        self.root_bounds.height()
    }

    /// Whether this tree's root measurement is valid under new constraints.
    pub fn is_compatible_spec(&self, width_spec: SizeSpec, height_spec: SizeSpec) -> bool {
        crate::diff::has_compatible_size_specs(
            self.width_spec,
            self.height_spec,
            width_spec,
            height_spec,
            self.width(),
            self.height(),
        )
    }

    /// Same outputs as `other` and nothing to rebind.
    ///
    /// A layout pass that produces an equivalent tree can keep publishing the
    /// previous one.
    pub fn is_equivalent(&self, other: &RenderTree) -> bool {
        self.outputs == other.outputs
            && self.ranges == other.ranges
            && other.diff.is_full_reuse()
    }

    /// Human readable listing, one output per line.
    pub fn dump(&self) -> String {
        let mut lines = vec![format!(
            "RenderTree {}x{}, {} outputs",
            self.width(),
            self.height(),
            self.outputs.len()
        )];
        for (index, output) in self.outputs.iter().enumerate() {
            let host = output
                .host_id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            let mut line = format!(
                "[{index}] {} {} host={host} {} {}",
                output.id, output.kind, output.bounds, output.component
            );
            if output.exclude_from_incremental_mount {
                line.push_str(" excluded");
            }
            if let Some(transition) = &output.transition_id {
                line.push_str(&format!(" transition={transition}"));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// Bounds of one affinity group member in the current and previous pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionBounds {
    /// Group the member belongs to.
    pub transition_id: TransitionId,
    /// Member kind.
    pub kind: OutputKind,
    /// Member id in the current tree.
    pub id: OutputId,
    /// Bounds in the current tree.
    pub current: Rect,
    /// Bounds of the same kind in the previous tree's group, if any.
    pub previous: Option<Rect>,
}

/// Start and end bounds for every member of every current affinity group.
pub fn transition_bounds(current: &RenderTree, previous: Option<&RenderTree>) -> Vec<TransitionBounds> {
    let mut bounds = Vec::new();
    for (transition, group) in current.affinity_groups().iter() {
        let before = previous.and_then(|tree| tree.affinity_groups().get(transition));
        for member in group.members() {
            bounds.push(TransitionBounds {
                transition_id: transition.clone(),
                kind: member.kind,
                id: member.id,
                current: member.bounds,
                previous: before
                    .and_then(|group| group.member(member.kind))
                    .map(|m| m.bounds),
            });
        }
    }
    bounds
}

#[cfg(test)]
#[path = "render_tree_tests.rs"]
mod tests;
