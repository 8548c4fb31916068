//! Error types for the reconciliation and mount core.
//!
//! # Error Hierarchy
//!
//! - [`AppError`] - Top-level error of the replay binary
//!   - [`CoreError`] - Failures of the core engines (building, mounting, releasing)
//!   - [`ConfigError`] - Config file read or parse failures
//!   - [`LoggingError`] - Tracing subscriber setup failures
//!   - [`SceneError`] - Scene fixture read or parse failures
//!   - `Output` - Writing the replay report to stdout failed
//!
//! [`IdentityConflict`] is not an error: duplicate keys and duplicate
//! transition ids are resolved deterministically and reported as
//! diagnostics on the built tree.
//!
//! # Recovery Strategy
//!
//! - `InvalidRootState` is recoverable: wait for layout and retry.
//! - `Released` means the caller holds a superseded tree or engine; drop it
//!   and use the current one.
//! - `MountOrderingViolation` is raised only under
//!   [`InvariantPolicy::Fail`](crate::mount::InvariantPolicy); under
//!   `Heal` the plan is repaired and a warning is logged instead.

use super::output::{OutputId, TransitionId};
use crate::config::ConfigError;
use crate::logging::LoggingError;
use crate::scene::SceneError;
use thiserror::Error;

/// Failures of the core engines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A render tree was requested before layout produced a measured root.
    #[error("cannot build a render tree without a measured root; layout has not completed")]
    InvalidRootState,

    /// An engine or tree was used after being superseded.
    #[error("{what} was used after being released")]
    Released {
        /// What was released.
        what: &'static str,
    },

    /// A host was scheduled for unmount while one of its descendants stays mounted.
    #[error("host {host} unmounted while descendant {straggler} is still mounted")]
    MountOrderingViolation {
        /// Host being unmounted.
        host: OutputId,
        /// First mounted descendant found after the host.
        straggler: OutputId,
    },
}

/// Identity collisions resolved while building a render tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityConflict {
    /// Two siblings declared the same explicit key.
    #[error("duplicate key '{key}' under '{parent}', resolved as '{resolved}'")]
    DuplicateKey {
        /// Global key of the parent.
        parent: String,
        /// Key declared by both siblings.
        key: String,
        /// Global key given to the later sibling.
        resolved: String,
    },

    /// Two different owners declared the same transition id.
    #[error("transition id {transition} already owned by '{first_owner}', '{owner}' remapped to {resolved}")]
    DuplicateTransitionId {
        /// Declared transition id.
        transition: TransitionId,
        /// Global key of the owner that claimed it first.
        first_owner: String,
        /// Global key of the later owner.
        owner: String,
        /// Transition id assigned to the later owner.
        resolved: TransitionId,
    },
}

/// Top-level error of the replay binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Core engine failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Config could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialized.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// Scene fixture could not be loaded.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Writing the replay report failed.
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
