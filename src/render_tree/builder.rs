//! Flattening a measured tree into a [`RenderTree`].

use super::{AffinityGroups, AffinityMember, RangeRegistration, RenderOutput, RenderTree};
use crate::diff::{DiffEngine, DiffRecord, PropsDigestPredicate, ReuseDecision, ShouldUpdate};
use crate::identity::{GlobalKey, IdGenerator, IdPass, SiblingKeys};
use crate::model::{
    CoreError, IdentityConflict, MeasuredNode, OutputId, OutputKind, TransitionId, TransitionKey,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct HostRef {
    id: OutputId,
    index: usize,
}

struct Component<'a> {
    id: OutputId,
    key: &'a GlobalKey,
    node: &'a MeasuredNode,
    level: u8,
    transition: Option<&'a TransitionId>,
}

/// Single-use builder for one layout pass.
///
/// Traversal is depth-first. Each component emits, in order: its host (if
/// it wraps its children or has z-indexed children), background, content,
/// children sorted by z-index, foreground, border.
pub struct RenderTreeBuilder<'p> {
    ids: IdPass,
    diff: DiffEngine<'p>,
    outputs: Vec<RenderOutput>,
    subtree_end: Vec<usize>,
    affinity: AffinityGroups,
    diagnostics: Vec<IdentityConflict>,
    records: HashMap<OutputId, DiffRecord>,
    ranges: Vec<RangeRegistration>,
}

impl<'p> RenderTreeBuilder<'p> {
    /// Builder issuing ids from `generator` and diffing against `previous`.
    pub fn new(
        generator: &Arc<IdGenerator>,
        previous: Option<&'p RenderTree>,
        predicate: &'p dyn ShouldUpdate,
    ) -> Self {
        Self {
            ids: generator.begin_pass(),
            diff: DiffEngine::new(previous, predicate),
            outputs: Vec::new(),
            subtree_end: Vec::new(),
            affinity: AffinityGroups::default(),
            diagnostics: Vec::new(),
            records: HashMap::new(),
            ranges: Vec::new(),
        }
    }

    /// Flatten `measured_root`.
    ///
    /// A root without children or drawables still yields a tree holding the
    /// root host.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidRootState`] when there is no measured root.
    pub fn build(mut self, measured_root: Option<&MeasuredNode>) -> Result<RenderTree, CoreError> {
        let root = measured_root.ok_or(CoreError::InvalidRootState)?;
        let key = GlobalKey::root(root.type_id, root.key.as_deref());
        self.visit(root, &key, None, 0, None, false);
        Ok(self.finish(root))
    }

    fn visit(
        &mut self,
        node: &MeasuredNode,
        key: &GlobalKey,
        parent_key: Option<&GlobalKey>,
        level: u8,
        host: Option<HostRef>,
        ancestor_remeasured: bool,
    ) {
        // The content id doubles as the component id, even without content.
        let id = self.ids.id_for(key, level, OutputKind::Content, None);
        let record = DiffRecord::from_node(id, node);
        let decision = self.diff.decide(&record, ancestor_remeasured);
        self.records.insert(id, record);

        self.ranges.extend(node.working_ranges.iter().map(|name| RangeRegistration {
            name: name.clone(),
            owner: key.clone(),
        }));

        let transition = node
            .transition_key
            .as_ref()
            .map(|declared| self.claim_transition(declared, key, parent_key));
        let component = Component {
            id,
            key,
            node,
            level,
            transition: transition.as_ref(),
        };

        let (inner, is_host) = match host {
            None => (self.emit_root_host(&component), true),
            Some(parent) if node.wrap_in_view || node.has_z_indexed_children() => {
                let host_id = self.ids.id_for(key, level, OutputKind::Host, None);
                let index = self.emit(&component, OutputKind::Host, host_id, parent);
                (HostRef { id: host_id, index }, true)
            }
            Some(parent) => (parent, false),
        };

        if node.background {
            self.emit_drawable(&component, OutputKind::Background, inner);
        }
        if node.has_content {
            self.emit(&component, OutputKind::Content, id, inner);
        }

        let mut siblings = SiblingKeys::new();
        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let (child_key, conflict) = siblings.resolve(key, child.type_id, child.key.as_deref());
            self.diagnostics.extend(conflict);
            children.push((child_key, child));
        }
        // Stable: equal z-indices keep declaration order.
        children.sort_by_key(|(_, child)| child.z_index);

        let remeasured = ancestor_remeasured || decision == ReuseDecision::Remeasure;
        for (child_key, child) in &children {
            self.visit(
                child,
                child_key,
                Some(key),
                level.saturating_add(1),
                Some(inner),
                remeasured,
            );
        }

        if node.foreground {
            self.emit_drawable(&component, OutputKind::Foreground, inner);
        }
        if node.border {
            self.emit_drawable(&component, OutputKind::Border, inner);
        }

        if is_host {
            self.subtree_end[inner.index] = self.outputs.len();
        }
    }

    fn claim_transition(
        &mut self,
        declared: &TransitionKey,
        key: &GlobalKey,
        parent_key: Option<&GlobalKey>,
    ) -> TransitionId {
        let transition = match declared {
            TransitionKey::Global { key: name } => TransitionId::global(name.clone()),
            TransitionKey::Scoped { key: name } => {
                TransitionId::scoped(name.clone(), parent_key.unwrap_or(key).to_string())
            }
            TransitionKey::Automatic => TransitionId::automatic(key.to_string()),
        };
        let (resolved, conflict) = self.affinity.claim(transition, key);
        self.diagnostics.extend(conflict);
        resolved
    }

    fn emit_root_host(&mut self, component: &Component<'_>) -> HostRef {
        let index = self.push(component, OutputKind::Host, OutputId::ROOT_HOST, None);
        HostRef {
            id: OutputId::ROOT_HOST,
            index,
        }
    }

    fn emit_drawable(&mut self, component: &Component<'_>, kind: OutputKind, host: HostRef) {
        let id = self.ids.id_for(component.key, component.level, kind, None);
        self.emit(component, kind, id, host);
    }

    fn emit(
        &mut self,
        component: &Component<'_>,
        kind: OutputKind,
        id: OutputId,
        host: HostRef,
    ) -> usize {
        self.push(component, kind, id, Some(host))
    }

    fn push(
        &mut self,
        component: &Component<'_>,
        kind: OutputKind,
        id: OutputId,
        host: Option<HostRef>,
    ) -> usize {
        let node = component.node;
        let index = self.outputs.len();
        let allocator = match kind {
            OutputKind::Content => node.content_allocator.clone(),
            _ => Some(kind.as_str().to_string()),
        };
        self.outputs.push(RenderOutput {
            id,
            kind,
            bounds: node.bounds,
            host_id: host.map(|h| h.id),
            host_index: host.map(|h| h.index),
            // The root host is the attached container itself.
            exclude_from_incremental_mount: node.exclude_from_incremental_mount || host.is_none(),
            transition_id: component.transition.cloned(),
            allocator,
            component_id: component.id,
            component: node.name.clone(),
            global_key: component.key.clone(),
        });
        self.subtree_end.push(index + 1);
        if let Some(transition) = component.transition {
            self.affinity.push(
                transition,
                AffinityMember {
                    kind,
                    id,
                    bounds: node.bounds,
                },
            );
        }
        index
    }

    fn finish(self, root: &MeasuredNode) -> RenderTree {
        let Self {
            diff,
            outputs,
            subtree_end,
            affinity,
            diagnostics,
            records,
            ranges,
            ..
        } = self;

        let mut by_top: Vec<usize> = (0..outputs.len()).collect();
        by_top.sort_by_key(|&index| outputs[index].bounds.top);
        let mut by_bottom: Vec<usize> = (0..outputs.len()).collect();
        by_bottom.sort_by_key(|&index| outputs[index].bounds.bottom);

        let positions: HashMap<OutputId, usize> = outputs
            .iter()
            .enumerate()
            .map(|(index, output)| (output.id, index))
            .collect();
        let current: HashSet<OutputId> = positions.keys().copied().collect();
        let diff = diff.finish(&current);

        debug!(
            outputs = outputs.len(),
            affinity_groups = affinity.len(),
            conflicts = diagnostics.len(),
            created = diff.count(ReuseDecision::Create),
            orphaned = diff.orphaned().len(),
            "built render tree"
        );

        RenderTree {
            outputs,
            by_top,
            by_bottom,
            positions,
            subtree_end,
            affinity,
            diagnostics,
            diff_records: records,
            diff,
            ranges,
            root_bounds: root.bounds,
            width_spec: root.width_spec,
            height_spec: root.height_spec,
        }
    }
}

/// Build with the default [`PropsDigestPredicate`].
///
/// # Errors
///
/// [`CoreError::InvalidRootState`] when there is no measured root.
pub fn build_render_tree(
    generator: &Arc<IdGenerator>,
    measured_root: Option<&MeasuredNode>,
    previous: Option<&RenderTree>,
) -> Result<RenderTree, CoreError> {
    RenderTreeBuilder::new(generator, previous, &PropsDigestPredicate).build(measured_root)
}
