//! Output identity: global keys and stable output ids.
//!
//! Every component gets a [`GlobalKey`] built from its ownership path. The
//! key plus an [`OutputKind`] maps to a 32-bit sequence through a shared
//! [`IdGenerator`], so a component keeps the same output ids on every layout
//! pass and on every thread that lays the tree out.
//!
//! # Key format
//!
//! A global key is a `,`-separated list of segments, one per ancestor. A
//! segment is the component type id, or `$<key>` when the author supplied an
//! explicit key. Siblings that would produce the same segment are
//! disambiguated with `!<n>` where `n` is the occurrence index:
//!
//! ```text
//! 1            root, type 1
//! 1,7          first unkeyed child of type 7
//! 1,7!1        second unkeyed child of type 7
//! 1,$header    child keyed "header"
//! 1,$header!1  second child keyed "header" (reported as a conflict)
//! ```

use crate::model::{IdentityConflict, OutputId, OutputKind};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Separator between ownership path segments.
pub const KEY_SEPARATOR: char = ',';
const DUPLICATE_MARKER: char = '!';
const EXPLICIT_KEY_MARKER: char = '$';

/// Ownership path of one component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GlobalKey(String);

impl GlobalKey {
    /// Key of a root component.
    pub fn root(type_id: u32, key: Option<&str>) -> Self {
        Self(segment(type_id, key))
    }

    /// Key of a child of `self` before sibling disambiguation.
    pub fn child(&self, type_id: u32, key: Option<&str>) -> Self {
        Self(format!(
            "{}{}{}",
            self.0,
            KEY_SEPARATOR,
            segment(type_id, key)
        ))
    }

    /// `self` with a `!n` occurrence suffix.
    pub fn with_occurrence(&self, occurrence: usize) -> Self {
        Self(format!("{}{}{}", self.0, DUPLICATE_MARKER, occurrence))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlobalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn segment(type_id: u32, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("{EXPLICIT_KEY_MARKER}{key}"),
        None => type_id.to_string(),
    }
}

/// Resolves the children of one parent to unique global keys.
///
/// Create one per parent and call [`SiblingKeys::resolve`] for each child in
/// declaration order.
#[derive(Debug, Default)]
pub struct SiblingKeys {
    occurrences: HashMap<GlobalKey, usize>,
    issued: HashSet<GlobalKey>,
}

impl SiblingKeys {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique global key for the next child of `parent`.
    ///
    /// Returns a [`IdentityConflict::DuplicateKey`] when the child carries an
    /// explicit key that an earlier sibling already used. Repeated unkeyed
    /// siblings are disambiguated silently.
    pub fn resolve(
        &mut self,
        parent: &GlobalKey,
        type_id: u32,
        key: Option<&str>,
    ) -> (GlobalKey, Option<IdentityConflict>) {
        let base = parent.child(type_id, key);
        let mut occurrence = self.occurrences.get(&base).copied().unwrap_or(0);
        let mut candidate = if occurrence == 0 {
            base.clone()
        } else {
            base.with_occurrence(occurrence)
        };
        // An explicit key may already spell out a suffixed key ("a!1").
        while self.issued.contains(&candidate) {
            occurrence += 1;
            candidate = base.with_occurrence(occurrence);
        }
        self.occurrences.insert(base.clone(), occurrence + 1);
        self.issued.insert(candidate.clone());

        let conflict = match key {
            Some(key) if candidate != base => {
                let conflict = IdentityConflict::DuplicateKey {
                    parent: parent.to_string(),
                    key: key.to_string(),
                    resolved: candidate.to_string(),
                };
                warn!(%conflict, "duplicate sibling key");
                Some(conflict)
            }
            _ => None,
        };
        (candidate, conflict)
    }
}

#[derive(Debug)]
struct IdTable {
    by_key: HashMap<(GlobalKey, OutputKind), u32>,
    by_sequence: HashMap<(u32, OutputKind), GlobalKey>,
    next: u32,
}

impl Default for IdTable {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            by_sequence: HashMap::new(),
            next: 1,
        }
    }
}

impl IdTable {
    fn fresh(&mut self) -> u32 {
        let sequence = self.next;
        // Sequence 0 belongs to the root host only.
        self.next = self.next.checked_add(1).unwrap_or(1);
        sequence
    }

    fn sequence_for(&mut self, key: &GlobalKey, kind: OutputKind) -> u32 {
        if let Some(&sequence) = self.by_key.get(&(key.clone(), kind)) {
            return sequence;
        }
        let sequence = self.fresh();
        self.by_key.insert((key.clone(), kind), sequence);
        self.by_sequence.insert((sequence, kind), key.clone());
        sequence
    }

    /// Bind `key` to an externally supplied sequence unless another key owns it.
    fn adopt(&mut self, key: &GlobalKey, kind: OutputKind, sequence: u32) -> bool {
        match self.by_sequence.get(&(sequence, kind)) {
            Some(owner) if owner != key => false,
            _ => {
                if let Some(old) = self.by_key.insert((key.clone(), kind), sequence) {
                    if old != sequence {
                        self.by_sequence.remove(&(old, kind));
                    }
                }
                self.by_sequence.insert((sequence, kind), key.clone());
                if sequence >= self.next {
                    self.next = sequence.checked_add(1).unwrap_or(1);
                }
                true
            }
        }
    }

    /// Drop every binding whose `(sequence, kind)` is not in `live`.
    /// `next` is untouched, so dropped sequences are not reissued.
    fn retain(&mut self, live: &HashSet<(u32, OutputKind)>) -> usize {
        let before = self.by_key.len();
        self.by_key
            .retain(|(_, kind), sequence| live.contains(&(*sequence, *kind)));
        self.by_sequence
            .retain(|binding, _| live.contains(binding));
        before - self.by_key.len()
    }
}

/// Thread-safe map from `(global key, kind)` to output id sequences.
///
/// Share one generator (through `Arc`) across every layout pass of a tree.
#[derive(Debug, Default)]
pub struct IdGenerator {
    table: Mutex<IdTable>,
}

impl IdGenerator {
    /// Empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a layout pass.
    pub fn begin_pass(self: &Arc<Self>) -> IdPass {
        IdPass {
            generator: Arc::clone(self),
            issued: HashSet::new(),
        }
    }

    /// Number of `(key, kind)` pairs currently bound.
    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    /// True if no id has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every `(key, kind)` pair whose id is not in `ids`.
    ///
    /// Call with the ids of the committed tree so components that left the
    /// tree stop holding table entries. A forgotten component that comes
    /// back later gets a fresh id. Returns how many pairs were dropped.
    pub fn retain_live(&self, ids: impl IntoIterator<Item = OutputId>) -> usize {
        let live: HashSet<_> = ids
            .into_iter()
            .filter_map(|id| id.kind().map(|kind| (id.sequence(), kind)))
            .collect();
        let removed = self.lock().retain(&live);
        if removed > 0 {
            debug!(removed, "pruned id bindings of departed components");
        }
        removed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IdTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Id issuance for one layout pass.
///
/// Guarantees that no id is issued twice within the pass.
#[derive(Debug)]
pub struct IdPass {
    generator: Arc<IdGenerator>,
    issued: HashSet<OutputId>,
}

impl IdPass {
    /// Id for the output of `kind` owned by the component at `ownership_path`
    /// with the given type and key.
    ///
    /// Equivalent to [`IdPass::id_for`] on `ownership_path.child(type, key)`.
    pub fn compute_id(
        &mut self,
        ownership_path: &GlobalKey,
        component_type_id: u32,
        key: Option<&str>,
        level: u8,
        kind: OutputKind,
        previous_id: Option<OutputId>,
    ) -> OutputId {
        let global_key = ownership_path.child(component_type_id, key);
        self.id_for(&global_key, level, kind, previous_id)
    }

    /// Id for the output of `kind` owned by the component with `global_key`.
    ///
    /// `previous_id` is carried over when it has the requested kind and has
    /// not been issued yet in this pass; the generator then remembers it for
    /// later passes.
    pub fn id_for(
        &mut self,
        global_key: &GlobalKey,
        level: u8,
        kind: OutputKind,
        previous_id: Option<OutputId>,
    ) -> OutputId {
        let mut table = self.generator.lock();

        if let Some(previous) = previous_id {
            let carry = previous.kind() == Some(kind)
                && !previous.is_root_host()
                && !self.issued.contains(&previous)
                && table.adopt(global_key, kind, previous.sequence());
            if carry {
                self.issued.insert(previous);
                return previous;
            }
        }

        let id = OutputId::compose(table.sequence_for(global_key, kind), kind, level);
        if self.issued.insert(id) {
            return id;
        }

        warn!(key = %global_key, %kind, "output id already issued in this pass");
        loop {
            let id = OutputId::compose(table.fresh(), kind, level);
            if self.issued.insert(id) {
                return id;
            }
        }
    }

    /// Ids issued so far in this pass.
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_key {
        use super::*;

        #[test]
        fn root_uses_type_id() {
            assert_eq!(GlobalKey::root(1, None).as_str(), "1");
        }

        #[test]
        fn explicit_key_replaces_type_id() {
            let root = GlobalKey::root(1, None);
            assert_eq!(root.child(7, Some("header")).as_str(), "1,$header");
        }

        #[test]
        fn repeated_unkeyed_siblings_get_occurrence_suffix_without_conflict() {
            let parent = GlobalKey::root(1, None);
            let mut siblings = SiblingKeys::new();
            let (first, c1) = siblings.resolve(&parent, 7, None);
            let (second, c2) = siblings.resolve(&parent, 7, None);
            let (third, c3) = siblings.resolve(&parent, 7, None);
            assert_eq!(first.as_str(), "1,7");
            assert_eq!(second.as_str(), "1,7!1");
            assert_eq!(third.as_str(), "1,7!2");
            assert!(c1.is_none() && c2.is_none() && c3.is_none());
        }

        #[test]
        fn duplicate_explicit_key_reports_conflict() {
            let parent = GlobalKey::root(1, None);
            let mut siblings = SiblingKeys::new();
            let (_, first) = siblings.resolve(&parent, 7, Some("row"));
            let (resolved, second) = siblings.resolve(&parent, 9, Some("row"));
            assert!(first.is_none());
            assert_eq!(resolved.as_str(), "1,$row!1");
            assert_eq!(
                second,
                Some(IdentityConflict::DuplicateKey {
                    parent: "1".to_string(),
                    key: "row".to_string(),
                    resolved: "1,$row!1".to_string(),
                })
            );
        }

        #[test]
        fn suffix_never_collides_with_explicit_suffixed_key() {
            let parent = GlobalKey::root(1, None);
            let mut siblings = SiblingKeys::new();
            let (a, _) = siblings.resolve(&parent, 7, Some("a!1"));
            let (b, _) = siblings.resolve(&parent, 7, Some("a"));
            let (c, _) = siblings.resolve(&parent, 7, Some("a"));
            assert_eq!(a.as_str(), "1,$a!1");
            assert_eq!(b.as_str(), "1,$a");
            assert_eq!(c.as_str(), "1,$a!2", "must skip the explicitly used 'a!1'");
        }
    }

    mod generator {
        use super::*;

        #[test]
        fn same_key_and_kind_yield_same_id_across_passes() {
            let generator = Arc::new(IdGenerator::new());
            let key = GlobalKey::root(1, None).child(2, None);

            let first = generator
                .begin_pass()
                .id_for(&key, 1, OutputKind::Content, None);
            let second = generator
                .begin_pass()
                .id_for(&key, 1, OutputKind::Content, None);
            assert_eq!(first, second);
        }

        #[test]
        fn kinds_of_one_component_never_collide() {
            let generator = Arc::new(IdGenerator::new());
            let mut pass = generator.begin_pass();
            let key = GlobalKey::root(1, None);
            let ids: HashSet<_> = OutputKind::ALL
                .iter()
                .map(|&kind| pass.id_for(&key, 0, kind, None))
                .collect();
            assert_eq!(ids.len(), OutputKind::ALL.len());
            for id in &ids {
                assert!(!id.is_root_host(), "only the builder issues the root host");
            }
        }

        #[test]
        fn kind_is_encoded_in_id() {
            let generator = Arc::new(IdGenerator::new());
            let mut pass = generator.begin_pass();
            let id = pass.id_for(&GlobalKey::root(1, None), 3, OutputKind::Border, None);
            assert_eq!(id.kind(), Some(OutputKind::Border));
            assert_eq!(id.level(), 3);
        }

        #[test]
        fn compute_id_matches_child_key() {
            let generator = Arc::new(IdGenerator::new());
            let parent = GlobalKey::root(1, None);
            let via_compute = generator.begin_pass().compute_id(
                &parent,
                4,
                Some("k"),
                1,
                OutputKind::Content,
                None,
            );
            let via_key = generator.begin_pass().id_for(
                &parent.child(4, Some("k")),
                1,
                OutputKind::Content,
                None,
            );
            assert_eq!(via_compute, via_key);
        }

        #[test]
        fn independent_generators_agree_on_identical_traversals() {
            let keys: Vec<_> = (0..5)
                .map(|i| GlobalKey::root(1, None).child(i, None))
                .collect();
            let run = || {
                let generator = Arc::new(IdGenerator::new());
                let mut pass = generator.begin_pass();
                keys.iter()
                    .map(|key| pass.id_for(key, 1, OutputKind::Content, None))
                    .collect::<Vec<_>>()
            };
            assert_eq!(run(), run());
        }
    }

    mod previous_id {
        use super::*;

        #[test]
        fn previous_id_of_same_kind_is_carried() {
            let generator = Arc::new(IdGenerator::new());
            let previous = OutputId::compose(900, OutputKind::Content, 2);
            let key = GlobalKey::root(1, None).child(5, None);

            let carried = generator
                .begin_pass()
                .id_for(&key, 2, OutputKind::Content, Some(previous));
            assert_eq!(carried, previous);

            let later = generator
                .begin_pass()
                .id_for(&key, 2, OutputKind::Content, None);
            assert_eq!(later, previous, "generator should remember the carried id");
        }

        #[test]
        fn previous_id_of_other_kind_is_ignored() {
            let generator = Arc::new(IdGenerator::new());
            let previous = OutputId::compose(900, OutputKind::Background, 2);
            let id = generator.begin_pass().id_for(
                &GlobalKey::root(1, None),
                2,
                OutputKind::Content,
                Some(previous),
            );
            assert_ne!(id, previous);
            assert_eq!(id.kind(), Some(OutputKind::Content));
        }

        #[test]
        fn previous_id_already_issued_in_pass_is_not_reused() {
            let generator = Arc::new(IdGenerator::new());
            let mut pass = generator.begin_pass();
            let first = pass.id_for(&GlobalKey::root(1, None), 0, OutputKind::Content, None);
            let second = pass.id_for(
                &GlobalKey::root(2, None),
                0,
                OutputKind::Content,
                Some(first),
            );
            assert_ne!(first, second);
            assert_eq!(pass.issued_count(), 2);
        }

        #[test]
        fn fresh_ids_skip_adopted_sequences() {
            let generator = Arc::new(IdGenerator::new());
            let mut pass = generator.begin_pass();
            let adopted = OutputId::compose(1, OutputKind::Content, 0);
            pass.id_for(&GlobalKey::root(9, None), 0, OutputKind::Content, Some(adopted));
            let fresh = pass.id_for(&GlobalKey::root(1, None), 0, OutputKind::Content, None);
            assert_ne!(fresh.sequence(), adopted.sequence());
        }
    }

    mod pruning {
        use super::*;

        #[test]
        fn retain_live_drops_departed_keys_only() {
            let generator = Arc::new(IdGenerator::new());
            let mut pass = generator.begin_pass();
            let root = GlobalKey::root(1, None);
            let kept = pass.id_for(&root.child(2, None), 1, OutputKind::Content, None);
            let gone = pass.id_for(&root.child(3, None), 1, OutputKind::Content, None);
            let gone_bg = pass.id_for(&root.child(3, None), 1, OutputKind::Background, None);

            assert_eq!(generator.retain_live([kept]), 2);
            assert_eq!(generator.len(), 1);

            let again = generator
                .begin_pass()
                .id_for(&root.child(2, None), 1, OutputKind::Content, None);
            assert_eq!(again, kept);

            let returned = generator
                .begin_pass()
                .id_for(&root.child(3, None), 1, OutputKind::Content, None);
            assert_ne!(returned, gone, "dropped sequences are not recycled");
            assert_ne!(returned.sequence(), gone_bg.sequence());
        }

        #[test]
        fn root_host_id_keeps_no_component_binding() {
            let generator = Arc::new(IdGenerator::new());
            generator
                .begin_pass()
                .id_for(&GlobalKey::root(1, None), 0, OutputKind::Content, None);
            assert_eq!(generator.retain_live([OutputId::ROOT_HOST]), 1);
            assert!(generator.is_empty());
        }
    }

    #[test]
    fn generator_is_shareable_across_threads() {
        let generator = Arc::new(IdGenerator::new());
        let key = GlobalKey::root(1, None);
        let ids: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let generator = Arc::clone(&generator);
                    let key = key.clone();
                    scope.spawn(move || {
                        generator
                            .begin_pass()
                            .id_for(&key, 0, OutputKind::Content, None)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread should not panic"))
                .collect()
        });
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(generator.len(), 1);
    }
}
