//! Registrations of one layout pass.

use super::{RangeEvent, RangePosition, RangeStatus, WorkingRange, WorkingRangeStatusTable};
use crate::identity::GlobalKey;
use crate::render_tree::RangeRegistration;
use std::sync::Arc;
use tracing::warn;

/// Owners registered under the same name and range instance.
#[derive(Debug, Clone)]
pub struct RangeGroup {
    /// Range name.
    pub name: String,
    /// Shared range implementation.
    pub range: Arc<dyn WorkingRange>,
    /// Owners in registration order.
    pub owners: Vec<GlobalKey>,
}

/// Working ranges registered during one layout pass.
#[derive(Debug, Clone, Default)]
pub struct WorkingRangeContainer {
    groups: Vec<RangeGroup>,
}

impl WorkingRangeContainer {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container for the registrations of a render tree.
    ///
    /// `resolve` maps a range name to its implementation; names it does not
    /// know are skipped with a warning.
    pub fn from_registrations<F>(registrations: &[RangeRegistration], resolve: F) -> Self
    where
        F: Fn(&str) -> Option<Arc<dyn WorkingRange>>,
    {
        let mut container = Self::new();
        for registration in registrations {
            match resolve(&registration.name) {
                Some(range) => container.register(&registration.name, range, registration.owner.clone()),
                None => warn!(
                    name = %registration.name,
                    owner = %registration.owner,
                    "no working range with this name"
                ),
            }
        }
        container
    }

    /// Register `owner` for `name`. Owners sharing a name and the same range
    /// instance end up in one group.
    pub fn register(&mut self, name: &str, range: Arc<dyn WorkingRange>, owner: GlobalKey) {
        let existing = self
            .groups
            .iter_mut()
            .find(|group| group.name == name && Arc::ptr_eq(&group.range, &range));
        match existing {
            Some(group) => {
                if !group.owners.contains(&owner) {
                    group.owners.push(owner);
                }
            }
            None => self.groups.push(RangeGroup {
                name: name.to_string(),
                range,
                owners: vec![owner],
            }),
        }
    }

    /// Groups in registration order.
    pub fn groups(&self) -> &[RangeGroup] {
        &self.groups
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether `owner` is registered for `name`.
    pub fn contains(&self, name: &str, owner: &GlobalKey) -> bool {
        self.groups
            .iter()
            .any(|group| group.name == name && group.owners.contains(owner))
    }

    /// Evaluate every registration at `position` and record transitions in
    /// `statuses`.
    pub fn check_and_dispatch(
        &self,
        position: &RangePosition,
        statuses: &mut WorkingRangeStatusTable,
    ) -> Vec<RangeEvent> {
        let mut events = Vec::new();
        for group in &self.groups {
            for owner in &group.owners {
                match statuses.status(&group.name, owner) {
                    RangeStatus::Unknown | RangeStatus::OutOfRange => {
                        if group.range.should_enter_range(position) {
                            statuses.set_status(&group.name, owner, RangeStatus::InRange);
                            events.push(RangeEvent::Entered {
                                name: group.name.clone(),
                                owner: owner.clone(),
                            });
                        }
                    }
                    RangeStatus::InRange => {
                        if group.range.should_exit_range(position) {
                            statuses.set_status(&group.name, owner, RangeStatus::OutOfRange);
                            events.push(RangeEvent::Exited {
                                name: group.name.clone(),
                                owner: owner.clone(),
                            });
                        }
                    }
                }
            }
        }
        events
    }

    /// Exit every registration still in range.
    pub fn dispatch_exit_if_needed(&self, statuses: &mut WorkingRangeStatusTable) -> Vec<RangeEvent> {
        let mut events = Vec::new();
        for group in &self.groups {
            for owner in &group.owners {
                if statuses.status(&group.name, owner) == RangeStatus::InRange {
                    statuses.set_status(&group.name, owner, RangeStatus::OutOfRange);
                    events.push(RangeEvent::Exited {
                        name: group.name.clone(),
                        owner: owner.clone(),
                    });
                }
            }
        }
        events
    }
}
