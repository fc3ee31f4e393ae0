use crate::binding::Binding;
use crate::node::Node;
use core::sync::atomic::{AtomicU64, Ordering};
use crossbeam_epoch::{self as epoch, Atomic, Owned};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One immutable build of the address tree plus its binding map.
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: Node,
    bindings: HashMap<String, Binding>,
    generation: u64,
}

impl Snapshot {
    pub fn new(root: Node, bindings: HashMap<String, Binding>) -> Self {
        Self {
            root,
            bindings,
            generation: 0,
        }
    }

    /// Placeholder served before the first build completes.
    pub fn empty() -> Self {
        Self::new(Node::root(""), HashMap::new())
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn binding(&self, path: &str) -> Option<&Binding> {
        self.bindings.get(path)
    }

    pub fn bindings(&self) -> &HashMap<String, Binding> {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// 0 for the placeholder, then increasing with every publication.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Every leaf in the tree has exactly one binding under the same path, and vice versa.
    pub fn is_consistent(&self) -> bool {
        let leaves = self.root.leaf_paths();
        leaves.len() == self.bindings.len()
            && leaves.iter().all(|path| self.bindings.contains_key(*path))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.root)
    }
}

/// The "current snapshot" slot.
///
/// ## Shadow-Swap
/// Readers pin an epoch, clone the `Arc` and leave; a publisher swaps the
/// pointer and defers destruction of the old one until every pinned reader
/// has moved on. Nobody ever observes a half-built snapshot.
pub struct SnapshotCell {
    current: Atomic<Arc<Snapshot>>,
    generation: AtomicU64,
    /// Keeps generation order and swap order identical.
    publish_lock: Mutex<()>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self {
            current: Atomic::new(Arc::new(Snapshot::empty())),
            generation: AtomicU64::new(0),
            publish_lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        let guard = epoch::pin();
        // # Safety: Acquire pairs with the AcqRel swap in `publish`, so the
        // pointee is fully initialised. The guard keeps it from being
        // reclaimed until after the Arc has been cloned.
        let shared = self.current.load(Ordering::Acquire, &guard);
        match unsafe { shared.as_ref() } {
            Some(snapshot) => Arc::clone(snapshot),
            None => Arc::new(Snapshot::empty()),
        }
    }

    /// Publishes `snapshot` and returns the generation stamped on it.
    pub fn publish(&self, mut snapshot: Snapshot) -> u64 {
        let _order = self.publish_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        snapshot.generation = generation;

        let guard = epoch::pin();
        let old = self.current.swap(Owned::new(Arc::new(snapshot)), Ordering::AcqRel, &guard);

        // # Safety: `old` is unreachable from the cell now; readers still
        // holding a guard finish before the deferred drop runs.
        unsafe {
            if !old.is_null() {
                guard.defer_destroy(old);
            }
        }
        generation
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SnapshotCell {
    fn drop(&mut self) {
        let guard = epoch::pin();
        let old = self.current.swap(epoch::Shared::null(), Ordering::AcqRel, &guard);
        // # Safety: same deferred reclamation as `publish`.
        unsafe {
            if !old.is_null() {
                guard.defer_destroy(old);
            }
        }
    }
}
