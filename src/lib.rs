//! Incremental mount for retained UI trees.
//!
//! A layout pass produces a measured tree. This crate turns it into a flat
//! [`RenderTree`] of outputs with stable ids, decides which work from the
//! previous pass can be reused, and mounts only the outputs that intersect
//! the visible rectangle as it moves.
//!
//! # Architecture
//!
//! - [`identity`]: global keys and stable [`OutputId`]s
//! - [`diff`]: reuse decisions between consecutive trees
//! - [`render_tree`]: flattening, sorted orderings, affinity groups
//! - [`mount`]: the incremental mount engine and tree swaps
//! - [`publish`]: versioned hand-off of trees from layout threads
//! - [`working_range`]: enter/exit callbacks around visible list items
//! - [`scene`]: JSON fixtures replayed by the `incmount` binary
//!
//! ```
//! use incmount::{build_render_tree, IdGenerator, IncrementalMountEngine, MeasuredNode, MountOptions, Rect};
//! use std::sync::Arc;
//!
//! let root = MeasuredNode::new(1, "Stack", Rect::new(0, 0, 10, 30)).with_children(
//!     (0..3).map(|i| MeasuredNode::content(2, "Item", Rect::from_xywh(0, i * 10, 10, 10))),
//! );
//! let tree = build_render_tree(&Arc::new(IdGenerator::new()), Some(&root), None)?;
//! let mut engine = IncrementalMountEngine::new(Arc::new(tree), MountOptions::default());
//!
//! let delta = engine.update_visible_rect(Rect::new(0, 10, 10, 20))?;
//! assert_eq!(delta.to_mount.len(), 2); // root host and the middle item
//! # Ok::<(), incmount::CoreError>(())
//! ```

pub mod config;
pub mod diff;
pub mod identity;
pub mod logging;
pub mod model;
pub mod mount;
pub mod publish;
pub mod render_tree;
pub mod scene;
pub mod working_range;

pub use diff::{DiffEngine, ReuseDecision, ShouldUpdate};
pub use identity::{GlobalKey, IdGenerator};
pub use model::{
    AppError, CoreError, IdentityConflict, MeasuredNode, OutputId, OutputKind, Rect, TransitionId,
};
pub use mount::{IncrementalMountEngine, MountCoordinator, MountDelta, MountOp, MountOptions};
pub use publish::{LayoutSession, TreePublisher};
pub use render_tree::{build_render_tree, RenderOutput, RenderTree};
pub use working_range::{RangeEvent, WorkingRangeTracker};
