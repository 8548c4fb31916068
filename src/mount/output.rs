//! Per-output mount bookkeeping.

use crate::model::OutputId;

/// Mutable mount state of one output, owned by a single engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalMountOutput {
    /// Output id.
    pub id: OutputId,
    /// Mount-order index in the backing tree.
    pub index: usize,
    /// Whether the output is currently mounted.
    pub is_mounted: bool,
    /// Position of this output in the tree's `by_top` ordering.
    pub position_in_by_top: usize,
    /// Position of this output in the tree's `by_bottom` ordering.
    pub position_in_by_bottom: usize,
}
