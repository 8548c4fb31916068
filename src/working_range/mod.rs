//! Working ranges: named windows around the visible items of a list.
//!
//! A component registers a range by name while it is laid out. As the list
//! scrolls, the host reports a [`RangePosition`] for the component and the
//! tracker turns range predicates into [`RangeEvent`]s.
//!
//! # State machine
//!
//! Each `(name, owner)` pair is `Unknown`, `InRange` or `OutOfRange`:
//!
//! ```text
//! Unknown ──enter──▶ InRange ──exit──▶ OutOfRange ──enter──▶ InRange …
//! ```
//!
//! `should_enter_range` is only asked outside the range and
//! `should_exit_range` only inside it. On teardown every pair still in range
//! is exited exactly once, so enter and exit events always come in pairs.

mod container;
mod tracker;

pub use container::{RangeGroup, WorkingRangeContainer};
pub use tracker::WorkingRangeTracker;

use crate::identity::GlobalKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Position of a component within a scrolling list, plus the visible window.
///
/// Indices follow list conventions: `-1` when nothing is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangePosition {
    /// Index of the component in the list.
    pub position: i32,
    /// First (partially) visible index.
    pub first_visible: i32,
    /// Last (partially) visible index.
    pub last_visible: i32,
    /// First fully visible index.
    pub first_fully_visible: i32,
    /// Last fully visible index.
    pub last_fully_visible: i32,
}

impl RangePosition {
    /// Position where partially and fully visible windows coincide.
    pub fn new(position: i32, first_visible: i32, last_visible: i32) -> Self {
        Self {
            position,
            first_visible,
            last_visible,
            first_fully_visible: first_visible,
            last_fully_visible: last_visible,
        }
    }
}

/// Enter/exit predicates of a working range.
pub trait WorkingRange: Send + Sync + fmt::Debug {
    /// Asked while the owner is outside the range.
    fn should_enter_range(&self, position: &RangePosition) -> bool;

    /// Asked while the owner is inside the range.
    fn should_exit_range(&self, position: &RangePosition) -> bool;
}

/// In range when the position is at most `before` items ahead of the first
/// visible item or `after` items past the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefetchRange {
    /// Items before the visible window.
    #[serde(default)]
    pub before: u32,
    /// Items after the visible window.
    #[serde(default)]
    pub after: u32,
}

impl PrefetchRange {
    /// Range extending `before` and `after` items around the visible window.
    pub fn new(before: u32, after: u32) -> Self {
        Self { before, after }
    }

    fn contains(&self, position: &RangePosition) -> bool {
        if position.first_visible < 0 || position.last_visible < position.first_visible {
            return false;
        }
        let start = i64::from(position.first_visible) - i64::from(self.before);
        let end = i64::from(position.last_visible) + i64::from(self.after);
        (start..=end).contains(&i64::from(position.position))
    }
}

impl WorkingRange for PrefetchRange {
    fn should_enter_range(&self, position: &RangePosition) -> bool {
        self.contains(position)
    }

    fn should_exit_range(&self, position: &RangePosition) -> bool {
        !self.contains(position)
    }
}

/// Status of one `(name, owner)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeStatus {
    /// Never evaluated.
    #[default]
    Unknown,
    /// Entered and not exited since.
    InRange,
    /// Exited.
    OutOfRange,
}

/// Status of every `(name, owner)` pair, kept across layout passes.
#[derive(Debug, Clone, Default)]
pub struct WorkingRangeStatusTable {
    statuses: HashMap<(String, GlobalKey), RangeStatus>,
}

impl WorkingRangeStatusTable {
    /// Empty table; every pair starts [`RangeStatus::Unknown`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of `name` for `owner`.
    pub fn status(&self, name: &str, owner: &GlobalKey) -> RangeStatus {
        self.statuses
            .get(&(name.to_string(), owner.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Record a status.
    pub fn set_status(&mut self, name: &str, owner: &GlobalKey, status: RangeStatus) {
        self.statuses
            .insert((name.to_string(), owner.clone()), status);
    }

    /// Pairs currently in range, sorted.
    pub fn in_range(&self) -> Vec<(String, GlobalKey)> {
        let mut pairs: Vec<_> = self
            .statuses
            .iter()
            .filter(|(_, &status)| status == RangeStatus::InRange)
            .map(|(pair, _)| pair.clone())
            .collect();
        pairs.sort();
        pairs
    }

    /// Forget every pair.
    pub fn clear(&mut self) {
        self.statuses.clear();
    }
}

/// Callback to deliver to a range owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RangeEvent {
    /// The owner entered the range.
    Entered {
        /// Range name.
        name: String,
        /// Owning component.
        owner: GlobalKey,
    },
    /// The owner left the range.
    Exited {
        /// Range name.
        name: String,
        /// Owning component.
        owner: GlobalKey,
    },
}

impl fmt::Display for RangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entered { name, owner } => write!(f, "enter   {name} {owner}"),
            Self::Exited { name, owner } => write!(f, "exit    {name} {owner}"),
        }
    }
}
