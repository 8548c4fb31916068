//! Swapping render trees under mounted content.

use super::engine::IncrementalMountEngine;
use super::ops::{MountDelta, MountOp, MountOptions};
use crate::diff::{PropsDigestPredicate, ShouldUpdate};
use crate::model::{CoreError, OutputId, Rect};
use crate::render_tree::RenderTree;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Last viewport request the coordinator received. It is applied again to
/// every tree attached afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewport {
    /// Mount what intersects this rectangle.
    Rect(Rect),
    /// Mount every output.
    MountAll,
    /// Keep nothing mounted.
    UnmountAll,
}

/// Owns the engine of the current tree and the last viewport request.
///
/// Every published tree goes through [`MountCoordinator::set_tree`], which
/// retires the previous engine and builds a fresh one seeded with whatever
/// content could be carried over.
pub struct MountCoordinator {
    engine: Option<IncrementalMountEngine>,
    viewport: Option<Viewport>,
    options: MountOptions,
    predicate: Arc<dyn ShouldUpdate>,
}

impl Default for MountCoordinator {
    fn default() -> Self {
        Self::new(MountOptions::default())
    }
}

impl fmt::Debug for MountCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountCoordinator")
            .field("engine", &self.engine)
            .field("viewport", &self.viewport)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl MountCoordinator {
    /// Coordinator with no tree attached, rebinding on props digest changes.
    pub fn new(options: MountOptions) -> Self {
        Self::with_predicate(options, Arc::new(PropsDigestPredicate))
    }

    /// Coordinator deciding rebinds with `predicate`. Use the predicate the
    /// trees are laid out with.
    pub fn with_predicate(options: MountOptions, predicate: Arc<dyn ShouldUpdate>) -> Self {
        Self {
            engine: None,
            viewport: None,
            options,
            predicate,
        }
    }

    /// Current tree.
    pub fn tree(&self) -> Option<&Arc<RenderTree>> {
        self.engine.as_ref().map(IncrementalMountEngine::tree)
    }

    /// Engine of the current tree.
    pub fn engine(&self) -> Option<&IncrementalMountEngine> {
        self.engine.as_ref()
    }

    /// Last viewport request received.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Last visible rectangle, unless a mount-all or unmount-all came after it.
    pub fn visible_rect(&self) -> Option<Rect> {
        match self.viewport {
            Some(Viewport::Rect(rect)) => Some(rect),
            _ => None,
        }
    }

    /// Attach `tree`, reconciling it with the content mounted for the
    /// previous tree.
    ///
    /// Operations come in this order:
    /// 1. unmount outputs that are gone or moved to another host,
    ///    descendants first
    /// 2. update retained outputs whose bounds changed or whose content
    ///    must be rebound
    /// 3. re-apply the last viewport request: the visible rectangle,
    ///    mount-all or unmount-all
    ///
    /// Content is rebound unless the component's diff record is unchanged
    /// against the previous tree's record under the coordinator's predicate
    /// and the new tree's own diff also chose to reuse mounted content.
    ///
    /// Passing the tree that is already attached does nothing.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the new engine's first update.
    pub fn set_tree(&mut self, tree: Arc<RenderTree>) -> Result<Vec<MountOp>, CoreError> {
        if let Some(engine) = &self.engine {
            if Arc::ptr_eq(engine.tree(), &tree) {
                return Ok(Vec::new());
            }
        }

        let mut ops = Vec::new();
        let mut retained: HashSet<OutputId> = HashSet::new();
        if let Some(mut old) = self.engine.take() {
            old.ensure_live()?;
            let previous = Arc::clone(old.tree());

            // Hosts come first, so a host that is not kept is decided
            // before anything it contains.
            let mut kept = vec![false; previous.len()];
            for (index, output) in previous.outputs().iter().enumerate() {
                let same_slot = tree.get(output.id).is_some_and(|next| {
                    next.kind == output.kind && next.host_id == output.host_id
                });
                let host_kept = output.host_index.map_or(true, |host| kept[host]);
                kept[index] = same_slot && host_kept;
            }
            for index in (0..previous.len()).rev() {
                if !old.output(index).is_mounted {
                    continue;
                }
                let output = previous.output(index);
                if kept[index] {
                    retained.insert(output.id);
                } else {
                    ops.push(MountOp::unmount(output));
                }
            }
            old.release();

            for output in tree.outputs() {
                if !retained.contains(&output.id) {
                    continue;
                }
                let rebind = self.must_rebind(&previous, &tree, output.component_id);
                let moved = previous
                    .get(output.id)
                    .is_some_and(|before| before.bounds != output.bounds);
                if rebind || moved {
                    ops.push(MountOp::Update {
                        id: output.id,
                        bounds: output.bounds,
                        rebind,
                    });
                }
            }
        }

        let carried = retained.len();
        let mut engine = IncrementalMountEngine::with_mounted(Arc::clone(&tree), self.options, &retained);
        let delta = match self.viewport {
            Some(Viewport::Rect(rect)) => engine.update_visible_rect(rect)?,
            Some(Viewport::MountAll) => engine.mount_all()?,
            Some(Viewport::UnmountAll) => MountDelta::default(),
            None if !self.options.incremental => engine.mount_all()?,
            None => MountDelta::default(),
        };
        ops.extend(delta.ops(&tree));
        self.engine = Some(engine);

        debug!(
            outputs = tree.len(),
            carried,
            ops = ops.len(),
            "attached render tree"
        );
        Ok(ops)
    }

    /// The new tree may have been diffed against a tree that was never
    /// attached, so its decision alone does not describe mounted content.
    fn must_rebind(&self, previous: &RenderTree, next: &RenderTree, component: OutputId) -> bool {
        let decided_reuse = next
            .diff_outcome()
            .decision(component)
            .is_some_and(|decision| decision.reuses_mount_content());
        let unchanged = previous
            .diff_records()
            .get(&component)
            .zip(next.diff_records().get(&component))
            .is_some_and(|(old, new)| {
                old.is_measurement_compatible(new) && !self.predicate.should_update(old, new)
            });
        !(decided_reuse && unchanged)
    }

    /// Forward a visible rectangle to the current engine.
    ///
    /// Without a tree the rectangle is remembered and applied on attach.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the engine.
    pub fn update_visible_rect(&mut self, rect: Rect) -> Result<Vec<MountOp>, CoreError> {
        self.viewport = Some(Viewport::Rect(rect));
        match self.engine.as_mut() {
            Some(engine) => {
                let delta = engine.update_visible_rect(rect)?;
                Ok(delta.ops(engine.tree()))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Mount everything in the current tree and in every tree attached
    /// until the next viewport request.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the engine.
    pub fn mount_all(&mut self) -> Result<Vec<MountOp>, CoreError> {
        self.viewport = Some(Viewport::MountAll);
        match self.engine.as_mut() {
            Some(engine) => {
                let delta = engine.mount_all()?;
                Ok(delta.ops(engine.tree()))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Unmount everything in the current tree. Trees attached afterwards
    /// mount nothing new until the next viewport request.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the engine.
    pub fn unmount_all(&mut self) -> Result<Vec<MountOp>, CoreError> {
        self.viewport = Some(Viewport::UnmountAll);
        match self.engine.as_mut() {
            Some(engine) => {
                let delta = engine.unmount_all()?;
                Ok(delta.ops(engine.tree()))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Unmount everything and drop the current tree.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError`] from the engine.
    pub fn detach(&mut self) -> Result<Vec<MountOp>, CoreError> {
        let ops = self.unmount_all()?;
        if let Some(mut engine) = self.engine.take() {
            engine.release();
        }
        Ok(ops)
    }
}
