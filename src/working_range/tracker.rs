//! Working range state across layout passes.

use super::{RangeEvent, RangePosition, WorkingRangeContainer, WorkingRangeStatusTable};
use crate::model::CoreError;
use tracing::debug;

/// Holds the container of the current layout pass and the status table
/// that outlives it.
#[derive(Debug, Default)]
pub struct WorkingRangeTracker {
    container: WorkingRangeContainer,
    statuses: WorkingRangeStatusTable,
    released: bool,
}

impl WorkingRangeTracker {
    /// Tracker with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Status table.
    pub fn statuses(&self) -> &WorkingRangeStatusTable {
        &self.statuses
    }

    /// Install the registrations of a new layout pass.
    ///
    /// Pairs that are in range but no longer registered are exited.
    ///
    /// # Errors
    ///
    /// [`CoreError::Released`] after teardown.
    pub fn set_container(&mut self, container: WorkingRangeContainer) -> Result<Vec<RangeEvent>, CoreError> {
        self.ensure_live()?;
        let previous = std::mem::replace(&mut self.container, container);

        let mut events = Vec::new();
        for group in previous.groups() {
            for owner in &group.owners {
                if self.container.contains(&group.name, owner) {
                    continue;
                }
                let mut single = WorkingRangeContainer::new();
                single.register(&group.name, group.range.clone(), owner.clone());
                events.extend(single.dispatch_exit_if_needed(&mut self.statuses));
            }
        }
        Ok(events)
    }

    /// Evaluate every registration at `position`.
    ///
    /// # Errors
    ///
    /// [`CoreError::Released`] after teardown.
    pub fn check(&mut self, position: &RangePosition) -> Result<Vec<RangeEvent>, CoreError> {
        self.ensure_live()?;
        let events = self.container.check_and_dispatch(position, &mut self.statuses);
        if !events.is_empty() {
            debug!(events = events.len(), position = position.position, "working range events");
        }
        Ok(events)
    }

    /// Exit everything still in range and release the tracker.
    ///
    /// # Errors
    ///
    /// [`CoreError::Released`] when already torn down.
    pub fn teardown(&mut self) -> Result<Vec<RangeEvent>, CoreError> {
        self.ensure_live()?;
        let events = self.container.dispatch_exit_if_needed(&mut self.statuses);
        self.statuses.clear();
        self.released = true;
        Ok(events)
    }

    /// True after teardown.
    pub fn is_released(&self) -> bool {
        self.released
    }

    fn ensure_live(&self) -> Result<(), CoreError> {
        if self.released {
            return Err(CoreError::Released {
                what: "working range tracker",
            });
        }
        Ok(())
    }
}
