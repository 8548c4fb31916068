//! Viewport-driven incremental mount.
//!
//! # Cursors
//!
//! For a visible rectangle `V` the engine keeps two cursors into the tree's
//! sorted orderings:
//!
//! - `top_cursor`: number of `by_top` entries with `top < V.bottom`
//! - `bottom_cursor`: number of `by_bottom` entries with `bottom <= V.top`
//!
//! An output overlaps `V` vertically iff its `by_top` position is below
//! `top_cursor` and its `by_bottom` position is at or above `bottom_cursor`.
//! When `V` moves vertically, only the outputs whose positions lie between
//! the old and new cursors can change visibility, so an update touches
//! `O(log n + k)` outputs.
//!
//! # Hosts
//!
//! An output is mounted iff it is visible (or excluded) and its host is
//! mounted. When a host flips, every output in its subtree is re-evaluated.
//! Horizontal moves, transitions to or from an empty rectangle, and the
//! first update recompute every output once.

use super::ops::{enforce_host_ordering, MountDelta, MountOptions};
use super::output::IncrementalMountOutput;
use crate::model::{CoreError, OutputId, Rect};
use crate::render_tree::RenderTree;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Mount state of one render tree.
///
/// Owned by the thread that drives viewport updates. When the backing tree is
/// replaced, build a new engine (see
/// [`MountCoordinator`](super::MountCoordinator)) and release this one.
#[derive(Debug)]
pub struct IncrementalMountEngine {
    tree: Arc<RenderTree>,
    outputs: Vec<IncrementalMountOutput>,
    visible: Option<Rect>,
    top_cursor: usize,
    bottom_cursor: usize,
    options: MountOptions,
    released: bool,
}

impl IncrementalMountEngine {
    /// Engine with nothing mounted.
    pub fn new(tree: Arc<RenderTree>, options: MountOptions) -> Self {
        Self::with_mounted(tree, options, &HashSet::new())
    }

    /// Engine whose outputs listed in `mounted` are already mounted, e.g.
    /// content carried over from a previous tree.
    pub fn with_mounted(
        tree: Arc<RenderTree>,
        options: MountOptions,
        mounted: &HashSet<OutputId>,
    ) -> Self {
        let mut outputs: Vec<IncrementalMountOutput> = tree
            .outputs()
            .iter()
            .enumerate()
            .map(|(index, output)| IncrementalMountOutput {
                id: output.id,
                index,
                is_mounted: mounted.contains(&output.id),
                position_in_by_top: 0,
                position_in_by_bottom: 0,
            })
            .collect();
        for (position, &index) in tree.by_top().iter().enumerate() {
            outputs[index].position_in_by_top = position;
        }
        for (position, &index) in tree.by_bottom().iter().enumerate() {
            outputs[index].position_in_by_bottom = position;
        }

        Self {
            tree,
            outputs,
            visible: None,
            top_cursor: 0,
            bottom_cursor: 0,
            options,
            released: false,
        }
    }

    /// Backing tree.
    pub fn tree(&self) -> &Arc<RenderTree> {
        &self.tree
    }

    /// Last rectangle applied; `None` before the first update and after
    /// `mount_all` / `unmount_all`.
    pub fn visible_rect(&self) -> Option<Rect> {
        self.visible
    }

    /// Bookkeeping of the output at mount-order `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn output(&self, index: usize) -> &IncrementalMountOutput {
        &self.outputs[index]
    }

    /// Whether the output with this id is mounted.
    pub fn is_mounted(&self, id: OutputId) -> bool {
        self.tree
            .position_of(id)
            .is_some_and(|index| self.outputs[index].is_mounted)
    }

    /// Mounted ids in mount order.
    pub fn mounted_ids(&self) -> Vec<OutputId> {
        self.outputs
            .iter()
            .filter(|output| output.is_mounted)
            .map(|output| output.id)
            .collect()
    }

    /// Number of mounted outputs.
    pub fn mounted_count(&self) -> usize {
        self.outputs.iter().filter(|output| output.is_mounted).count()
    }

    /// True once [`IncrementalMountEngine::release`] was called.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Invalidate this engine; every later call fails with
    /// [`CoreError::Released`].
    pub fn release(&mut self) {
        self.released = true;
    }

    pub(crate) fn ensure_live(&self) -> Result<(), CoreError> {
        if self.released {
            return Err(CoreError::Released {
                what: "incremental mount engine",
            });
        }
        Ok(())
    }

    /// Move the visible rectangle to `rect`.
    ///
    /// Returns the outputs to mount (hosts first) and to unmount (descendants
    /// first). Applying the same rectangle twice yields an empty delta.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Released`] after [`IncrementalMountEngine::release`]
    /// - [`CoreError::MountOrderingViolation`] under
    ///   [`InvariantPolicy::Fail`](super::InvariantPolicy) if the plan would
    ///   unmount a host before its descendants
    pub fn update_visible_rect(&mut self, rect: Rect) -> Result<MountDelta, CoreError> {
        self.ensure_live()?;
        if !self.options.incremental {
            let delta = self.mount_all()?;
            self.visible = Some(rect);
            return Ok(delta);
        }

        let (to_mount, to_unmount) = match self.visible {
            Some(previous) if previous == rect => return Ok(MountDelta::default()),
            Some(previous) if scrolls_vertically(&previous, &rect) => self.scroll_to(&rect),
            _ => self.recompute(&rect),
        };
        match self.apply(to_mount, to_unmount) {
            Ok(delta) => {
                self.visible = Some(rect);
                Ok(delta)
            }
            Err(error) => {
                // Cursors already moved; force a full recompute next time.
                self.visible = None;
                Err(error)
            }
        }
    }

    /// Mount every output regardless of visibility.
    ///
    /// # Errors
    ///
    /// [`CoreError::Released`] after [`IncrementalMountEngine::release`].
    pub fn mount_all(&mut self) -> Result<MountDelta, CoreError> {
        self.ensure_live()?;
        let to_mount = (0..self.outputs.len())
            .filter(|&index| !self.outputs[index].is_mounted)
            .collect();
        self.visible = None;
        self.apply(to_mount, Vec::new())
    }

    /// Unmount every output, excluded ones and the root host included.
    ///
    /// # Errors
    ///
    /// [`CoreError::Released`] after [`IncrementalMountEngine::release`].
    pub fn unmount_all(&mut self) -> Result<MountDelta, CoreError> {
        self.ensure_live()?;
        let to_unmount = (0..self.outputs.len())
            .filter(|&index| self.outputs[index].is_mounted)
            .collect();
        self.visible = None;
        self.apply(Vec::new(), to_unmount)
    }

    fn top_cursor_for(&self, rect: &Rect) -> usize {
        let tree = &self.tree;
        tree.by_top()
            .partition_point(|&index| tree.output(index).bounds.top < rect.bottom)
    }

    fn bottom_cursor_for(&self, rect: &Rect) -> usize {
        let tree = &self.tree;
        tree.by_bottom()
            .partition_point(|&index| tree.output(index).bounds.bottom <= rect.top)
    }

    /// Visibility of one output, ignoring its hosts. Valid only after the
    /// cursors were moved to `rect`.
    fn wants_mounted(&self, index: usize, rect: &Rect) -> bool {
        let output = self.tree.output(index);
        if output.exclude_from_incremental_mount {
            return true;
        }
        let state = &self.outputs[index];
        let visible = !rect.is_empty()
            && state.position_in_by_top < self.top_cursor
            && state.position_in_by_bottom >= self.bottom_cursor
            && output.bounds.overlaps_horizontally(rect);
        debug_assert_eq!(visible, output.bounds.intersects_visible(rect));
        visible
    }

    fn move_cursors(&mut self, rect: &Rect) -> (usize, usize) {
        let old = (self.top_cursor, self.bottom_cursor);
        self.top_cursor = self.top_cursor_for(rect);
        self.bottom_cursor = self.bottom_cursor_for(rect);
        old
    }

    /// Vertical move: only outputs crossing a cursor, plus subtrees of hosts
    /// that flip, are evaluated.
    fn scroll_to(&mut self, rect: &Rect) -> (Vec<usize>, Vec<usize>) {
        let (old_top, old_bottom) = self.move_cursors(rect);
        let tree = Arc::clone(&self.tree);

        let mut pending: BTreeSet<usize> = BTreeSet::new();
        let (lo, hi) = ordered(old_top, self.top_cursor);
        pending.extend(&tree.by_top()[lo..hi]);
        let (lo, hi) = ordered(old_bottom, self.bottom_cursor);
        pending.extend(&tree.by_bottom()[lo..hi]);

        let mut decided: HashMap<usize, bool> = HashMap::new();
        let mut to_mount = Vec::new();
        let mut to_unmount = Vec::new();
        while let Some(index) = pending.pop_first() {
            let output = tree.output(index);
            let host_mounted = output.host_index.map_or(true, |host| {
                decided
                    .get(&host)
                    .copied()
                    .unwrap_or(self.outputs[host].is_mounted)
            });
            let desired = host_mounted && self.wants_mounted(index, rect);
            decided.insert(index, desired);

            if desired == self.outputs[index].is_mounted {
                continue;
            }
            if desired {
                to_mount.push(index);
            } else {
                to_unmount.push(index);
            }
            if output.kind.is_host() {
                pending.extend(tree.descendants(index));
            }
        }
        (to_mount, to_unmount)
    }

    /// Evaluate every output once, in mount order.
    fn recompute(&mut self, rect: &Rect) -> (Vec<usize>, Vec<usize>) {
        self.move_cursors(rect);
        let tree = Arc::clone(&self.tree);

        let mut desired = vec![false; self.outputs.len()];
        let mut to_mount = Vec::new();
        let mut to_unmount = Vec::new();
        for index in 0..self.outputs.len() {
            let host_mounted = tree
                .output(index)
                .host_index
                .map_or(true, |host| desired[host]);
            desired[index] = host_mounted && self.wants_mounted(index, rect);
            match (desired[index], self.outputs[index].is_mounted) {
                (true, false) => to_mount.push(index),
                (false, true) => to_unmount.push(index),
                _ => {}
            }
        }
        (to_mount, to_unmount)
    }

    /// Order the plan, check host ordering and flip the flags.
    fn apply(
        &mut self,
        to_mount: Vec<usize>,
        mut to_unmount: Vec<usize>,
    ) -> Result<MountDelta, CoreError> {
        // Both lists arrive ascending; unmount descendants first.
        to_unmount.reverse();
        let outputs = &self.outputs;
        enforce_host_ordering(
            &self.tree,
            |index| outputs[index].is_mounted,
            &mut to_unmount,
            self.options.policy,
        )?;

        for &index in &to_unmount {
            self.outputs[index].is_mounted = false;
        }
        for &index in &to_mount {
            self.outputs[index].is_mounted = true;
        }

        let delta = MountDelta {
            to_mount: to_mount.iter().map(|&i| self.outputs[i].id).collect(),
            to_unmount: to_unmount.iter().map(|&i| self.outputs[i].id).collect(),
        };
        if !delta.is_empty() {
            debug!(
                mounted = delta.to_mount.len(),
                unmounted = delta.to_unmount.len(),
                total_mounted = self.mounted_count(),
                visible = ?self.visible,
                "incremental mount update"
            );
        }
        Ok(delta)
    }
}

/// Vertical-only move between two non-empty rectangles.
fn scrolls_vertically(previous: &Rect, next: &Rect) -> bool {
    !previous.is_empty()
        && !next.is_empty()
        && previous.left == next.left
        && previous.right == next.right
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
