//! Affinity groups: outputs that animate together under one transition id.

use crate::identity::GlobalKey;
use crate::model::{IdentityConflict, OutputId, OutputKind, Rect, TransitionId};
use std::collections::HashMap;
use tracing::warn;

/// One output of an affinity group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffinityMember {
    /// Role of the output within its component.
    pub kind: OutputKind,
    /// Output id.
    pub id: OutputId,
    /// Bounds in root coordinates.
    pub bounds: Rect,
}

/// Outputs of one component sharing a transition id, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityGroup {
    owner: GlobalKey,
    members: Vec<AffinityMember>,
}

impl AffinityGroup {
    /// Global key of the component that declared the transition.
    pub fn owner(&self) -> &GlobalKey {
        &self.owner
    }

    /// Members in traversal order.
    pub fn members(&self) -> &[AffinityMember] {
        &self.members
    }

    /// Member of the given kind, if the component emitted one.
    pub fn member(&self, kind: OutputKind) -> Option<&AffinityMember> {
        self.members.iter().find(|member| member.kind == kind)
    }
}

/// Affinity groups of one render tree, in order of first declaration.
///
/// Holds at most one group per transition id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffinityGroups {
    groups: Vec<(TransitionId, AffinityGroup)>,
    index: HashMap<TransitionId, usize>,
}

impl AffinityGroups {
    /// Group for `transition`.
    pub fn get(&self, transition: &TransitionId) -> Option<&AffinityGroup> {
        self.index.get(transition).map(|&i| &self.groups[i].1)
    }

    /// Groups in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&TransitionId, &AffinityGroup)> {
        self.groups.iter().map(|(id, group)| (id, group))
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True if no output carries a transition id.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Reserve `transition` for `owner`.
    ///
    /// A transition id already held by a different owner is remapped to the
    /// first free `!n`-suffixed key and reported as a conflict.
    pub(crate) fn claim(
        &mut self,
        transition: TransitionId,
        owner: &GlobalKey,
    ) -> (TransitionId, Option<IdentityConflict>) {
        let first_owner = match self.get(&transition) {
            None => {
                self.open(transition.clone(), owner);
                return (transition, None);
            }
            Some(group) if group.owner == *owner => return (transition, None),
            Some(group) => group.owner.to_string(),
        };

        let mut occurrence = 1;
        let resolved = loop {
            let candidate = transition.with_key_suffix(&format!("!{occurrence}"));
            match self.get(&candidate) {
                None => break candidate,
                Some(group) if group.owner == *owner => break candidate,
                Some(_) => occurrence += 1,
            }
        };
        if self.get(&resolved).is_none() {
            self.open(resolved.clone(), owner);
        }

        let conflict = IdentityConflict::DuplicateTransitionId {
            transition,
            first_owner,
            owner: owner.to_string(),
            resolved: resolved.clone(),
        };
        warn!(%conflict, "duplicate transition id");
        (resolved, Some(conflict))
    }

    /// Append an output to a group opened by [`AffinityGroups::claim`].
    pub(crate) fn push(&mut self, transition: &TransitionId, member: AffinityMember) {
        if let Some(&i) = self.index.get(transition) {
            self.groups[i].1.members.push(member);
        }
    }

    fn open(&mut self, transition: TransitionId, owner: &GlobalKey) {
        self.index.insert(transition.clone(), self.groups.len());
        self.groups.push((
            transition,
            AffinityGroup {
                owner: owner.clone(),
                members: Vec::new(),
            },
        ));
    }
}
