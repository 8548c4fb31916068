//! Publishing render trees from layout threads.
//!
//! Layout may run on any thread; the thread that drives mounting only ever
//! sees complete trees. A tree is published by swapping an `Arc` under a
//! lock, and a version number keeps late results of older layouts from
//! replacing newer ones.

use crate::diff::{PropsDigestPredicate, ShouldUpdate};
use crate::identity::IdGenerator;
use crate::model::{CoreError, MeasuredNode};
use crate::render_tree::{RenderTree, RenderTreeBuilder};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct Committed {
    version: u64,
    tree: Option<Arc<RenderTree>>,
}

/// Versioned, forward-only slot holding the current render tree.
#[derive(Debug, Default)]
pub struct TreePublisher {
    committed: RwLock<Committed>,
    next: AtomicU64,
}

impl TreePublisher {
    /// Publisher with nothing committed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Version for a layout that is about to start. Strictly increasing.
    pub fn next_version(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Commit `tree` as `version`.
    ///
    /// Returns false and leaves the slot untouched when a version at least
    /// as new is already committed.
    pub fn publish(&self, version: u64, tree: Arc<RenderTree>) -> bool {
        let mut committed = self
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if version <= committed.version {
            debug!(version, committed = committed.version, "discarding stale render tree");
            return false;
        }
        committed.version = version;
        committed.tree = Some(tree);
        true
    }

    /// Current tree, if any.
    pub fn current(&self) -> Option<Arc<RenderTree>> {
        self.read().tree.clone()
    }

    /// Version of the current tree; 0 before the first commit.
    pub fn committed_version(&self) -> u64 {
        self.read().version
    }

    /// Whether `tree` is the committed tree.
    pub fn is_current(&self, tree: &Arc<RenderTree>) -> bool {
        self.read()
            .tree
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, tree))
    }

    /// Fail unless `tree` is the committed tree.
    ///
    /// # Errors
    ///
    /// [`CoreError::Released`] for a superseded tree.
    pub fn ensure_current(&self, tree: &Arc<RenderTree>) -> Result<(), CoreError> {
        if self.is_current(tree) {
            Ok(())
        } else {
            Err(CoreError::Released { what: "render tree" })
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Committed> {
        self.committed.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of [`LayoutSession::layout`].
#[derive(Debug, Clone)]
pub struct LayoutCommit {
    /// Version the layout ran under.
    pub version: u64,
    /// Tree produced, or the committed tree when nothing changed.
    pub tree: Arc<RenderTree>,
    /// Whether this layout replaced the committed tree.
    pub committed: bool,
}

/// Lays out measured trees against the last committed tree and publishes
/// the result. Shareable across layout threads.
pub struct LayoutSession {
    generator: Arc<IdGenerator>,
    publisher: Arc<TreePublisher>,
    predicate: Box<dyn ShouldUpdate>,
    in_flight: AtomicUsize,
}

/// Counts one running layout for as long as it lives.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }

    fn is_alone(&self) -> bool {
        self.0.load(Ordering::Acquire) == 1
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl LayoutSession {
    /// Session using [`PropsDigestPredicate`].
    pub fn new(publisher: Arc<TreePublisher>) -> Self {
        Self::with_predicate(publisher, Box::new(PropsDigestPredicate))
    }

    /// Session with a custom reuse predicate.
    pub fn with_predicate(publisher: Arc<TreePublisher>, predicate: Box<dyn ShouldUpdate>) -> Self {
        Self {
            generator: Arc::new(IdGenerator::new()),
            publisher,
            predicate,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Publisher the session commits to.
    pub fn publisher(&self) -> &Arc<TreePublisher> {
        &self.publisher
    }

    /// Id generator shared by every layout of this session.
    pub fn generator(&self) -> &Arc<IdGenerator> {
        &self.generator
    }

    /// Build a tree for `root` and publish it.
    ///
    /// When the new tree is equivalent to the committed one the committed
    /// `Arc` is returned and nothing is published, so mount coordinators
    /// see the same pointer and skip the swap. After a commit made while no
    /// other layout of this session is running, the id generator forgets
    /// components the new tree no longer contains.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidRootState`] when `root` is `None`.
    pub fn layout(&self, root: Option<&MeasuredNode>) -> Result<LayoutCommit, CoreError> {
        let in_flight = InFlight::enter(&self.in_flight);
        let version = self.publisher.next_version();
        let previous = self.publisher.current();
        let tree = RenderTreeBuilder::new(&self.generator, previous.as_deref(), self.predicate.as_ref())
            .build(root)?;

        if let Some(previous) = previous {
            if previous.is_equivalent(&tree) {
                debug!(version, "layout produced an equivalent tree");
                return Ok(LayoutCommit {
                    version,
                    tree: previous,
                    committed: false,
                });
            }
        }

        let tree = Arc::new(tree);
        let committed = self.publisher.publish(version, Arc::clone(&tree));
        // Another layout may still be binding keys the new tree lacks.
        if committed && in_flight.is_alone() {
            self.generator.retain_live(tree.live_ids());
        }
        Ok(LayoutCommit {
            version,
            tree,
            committed,
        })
    }
}

impl std::fmt::Debug for LayoutSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutSession")
            .field("generator", &self.generator)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}
