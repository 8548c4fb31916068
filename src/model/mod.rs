//! Domain model types (pure).
//!
//! Geometry, output identifiers, the measured input tree and the error
//! taxonomy shared by every engine in the crate.

pub mod error;
pub mod geometry;
pub mod measured;
pub mod output;

// Re-export for convenience
pub use error::{AppError, CoreError, IdentityConflict};
pub use geometry::Rect;
pub use measured::{MeasuredNode, SizeSpec, SpecMode};
pub use output::{OutputId, OutputKind, TransitionId, TransitionKey, TransitionKind};
