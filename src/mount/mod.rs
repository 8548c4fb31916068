//! Incremental mount: deciding which outputs of a render tree are mounted
//! for a given visible rectangle.
//!
//! # Architecture
//!
//! - [`IncrementalMountEngine`]: mount state of one tree, driven by
//!   visible-rectangle updates
//! - [`MountCoordinator`]: swaps trees under mounted content
//! - [`MountOp`]: instructions for the platform mount layer
//!
//! Mounts are always emitted hosts first and unmounts descendants first;
//! [`enforce_host_ordering`] checks the latter before anything is flipped.

mod coordinator;
mod engine;
mod ops;
mod output;

pub use coordinator::{MountCoordinator, Viewport};
pub use engine::IncrementalMountEngine;
pub use ops::{enforce_host_ordering, InvariantPolicy, MountDelta, MountOp, MountOptions};
pub use output::IncrementalMountOutput;
