//! Latch-free Bw-tree.
//!
//! Nodes are addressed through a mapping table of atomic slots. Every
//! modification prepends an immutable delta record to a node's chain with a
//! single compare-and-swap on its slot; no operation ever takes a lock.
//!
//! Structure modifications are split into independently published steps:
//!
//! ```text
//! 1. consolidate   new base replaces the chain (old chain retired to the epoch GC)
//! 2. split         sibling published in a fresh slot, Split delta CAS'd on the node
//! 3. index entry   IndexEntry delta CAS'd on the parent (or a new root installed)
//! ```
//!
//! Step 3 may be performed by any thread. A traversal that has to move right
//! across a split finishes the parent update before continuing, so a stalled
//! writer never blocks anyone.

mod backoff;
mod constants;
mod mapping;
mod node;
mod stats;

pub use mapping::NodeId;
pub use stats::{BwTreeStats, BwTreeStatsSnapshot};

use crate::container::InsertOutcome;
use crate::key::EncodedKey;
use crate::location::ItemPointer;
use arbor_common::{ArborError, IndexConfig, Result};
use backoff::Backoff;
use crossbeam_epoch::{self as epoch, Guard, Owned, Shared};
use mapping::MappingTable;
use node::{
    InnerBase, LeafBase, LeafSearch, Node, NodeBody, Route, consolidate_inner, consolidate_leaf,
    leftmost_child, route_inner, search_leaf,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// What a leaf write does after looking at the key's current locations.
enum LeafWrite<T> {
    /// Post this delta; report `T` once it is installed.
    Post(NodeBody, T),
    /// Post nothing and report `T`.
    Done(T),
}

/// Concurrent ordered map from [`EncodedKey`] to a set of [`ItemPointer`]s.
pub struct BwTree {
    mapping: MappingTable,
    root: AtomicU64,
    delta_chain_threshold: usize,
    leaf_max_entries: usize,
    inner_max_entries: usize,
    max_backoff_spins: u32,
    stats: BwTreeStats,
}

impl BwTree {
    /// Creates an empty tree: a single empty leaf as root.
    pub fn new(config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let mapping = MappingTable::new(config.max_nodes);
        let root = mapping
            .allocate(Owned::new(Node::leaf(LeafBase::default())))
            .ok_or_else(|| ArborError::Internal("mapping table has no room for the root".into()))?;

        Ok(Self {
            mapping,
            root: AtomicU64::new(root.0),
            delta_chain_threshold: config.delta_chain_threshold,
            leaf_max_entries: config.leaf_max_entries,
            inner_max_entries: config.inner_max_entries,
            max_backoff_spins: config.max_backoff_spins,
            stats: BwTreeStats::default(),
        })
    }

    // =========================================================================
    // Point operations
    // =========================================================================

    /// Returns every location stored under `key`; empty if none.
    pub fn get(&self, key: &EncodedKey) -> Vec<ItemPointer> {
        let guard = &epoch::pin();
        let (mut id, path) = self.find_leaf(key, guard);
        loop {
            let (_, head) = self.mapping.load(id, guard);
            match search_leaf(head, key, guard) {
                LeafSearch::Found(set) => return set,
                LeafSearch::MoveRight { separator, sibling } => {
                    self.finish_split(&path, id, separator, sibling, guard);
                    id = sibling;
                }
            }
        }
    }

    /// Adds `location` under `key`. Returns false if the pair was present.
    pub fn insert(&self, key: &EncodedKey, location: ItemPointer) -> bool {
        self.write_leaf(key, |set| {
            if set.contains(&location) {
                LeafWrite::Done(false)
            } else {
                LeafWrite::Post(
                    NodeBody::Insert {
                        key: key.clone(),
                        location,
                    },
                    true,
                )
            }
        })
    }

    /// Adds `location` under `key` unless some existing location satisfies
    /// `reject`.
    ///
    /// The check and the insert are one atomic step: the insert is posted
    /// against exactly the chain head the check was evaluated on.
    pub fn conditional_insert<F>(
        &self,
        key: &EncodedKey,
        location: ItemPointer,
        reject: F,
    ) -> InsertOutcome
    where
        F: Fn(&ItemPointer) -> bool,
    {
        self.write_leaf(key, |set| {
            if set.contains(&location) {
                LeafWrite::Done(InsertOutcome::AlreadyPresent)
            } else if set.iter().any(&reject) {
                LeafWrite::Done(InsertOutcome::Rejected)
            } else {
                LeafWrite::Post(
                    NodeBody::Insert {
                        key: key.clone(),
                        location,
                    },
                    InsertOutcome::Inserted,
                )
            }
        })
    }

    /// Removes `location` from `key`. Returns false if the pair was absent.
    pub fn remove(&self, key: &EncodedKey, location: ItemPointer) -> bool {
        self.write_leaf(key, |set| {
            if set.contains(&location) {
                LeafWrite::Post(
                    NodeBody::Delete {
                        key: key.clone(),
                        location,
                    },
                    true,
                )
            } else {
                LeafWrite::Done(false)
            }
        })
    }

    // =========================================================================
    // Whole-tree views
    // =========================================================================

    /// Returns every non-empty entry in key order.
    ///
    /// Walks the leaf level left to right. Each leaf is read atomically but
    /// the scan as a whole is not a snapshot under concurrent writes.
    pub fn scan_all(&self) -> Vec<(EncodedKey, Vec<ItemPointer>)> {
        let guard = &epoch::pin();
        let mut id = self.leftmost_leaf(guard);
        let mut out = Vec::new();
        loop {
            let (_, head) = self.mapping.load(id, guard);
            let base = consolidate_leaf(head, guard);
            out.extend(base.entries);
            match base.sibling {
                Some((_, right)) => id = right,
                None => return out,
            }
        }
    }

    /// Returns the number of keys holding at least one location.
    pub fn len_keys(&self) -> usize {
        self.scan_all().len()
    }

    /// Returns the number of levels, counting the leaf level.
    pub fn height(&self) -> usize {
        let guard = &epoch::pin();
        let mut id = self.root_id();
        let mut height = 1;
        loop {
            let (_, head) = self.mapping.load(id, guard);
            if head.is_leaf {
                return height;
            }
            id = leftmost_child(head, guard);
            height += 1;
        }
    }

    /// Returns the number of node ids handed out, including ids of
    /// structure changes that lost a race and were discarded.
    pub fn node_count(&self) -> u64 {
        self.mapping.allocated()
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &BwTreeStats {
        &self.stats
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    #[inline]
    fn root_id(&self) -> NodeId {
        NodeId(self.root.load(Ordering::Acquire))
    }

    /// Descends from the root to the leaf whose range may hold `key`.
    ///
    /// Returns the leaf and the inner nodes visited on the way, root first.
    /// The leaf may since have split; callers still move right as needed.
    fn find_leaf(&self, key: &EncodedKey, guard: &Guard) -> (NodeId, Vec<NodeId>) {
        let mut path = Vec::new();
        let mut id = self.root_id();
        loop {
            let (_, head) = self.mapping.load(id, guard);
            if head.is_leaf {
                return (id, path);
            }
            match route_inner(head, key, guard) {
                Route::Child { child, .. } => {
                    path.push(id);
                    id = child;
                }
                Route::MoveRight { separator, sibling } => {
                    self.finish_split(&path, id, separator, sibling, guard);
                    id = sibling;
                }
            }
        }
    }

    fn leftmost_leaf(&self, guard: &Guard) -> NodeId {
        let mut id = self.root_id();
        loop {
            let (_, head) = self.mapping.load(id, guard);
            if head.is_leaf {
                return id;
            }
            id = leftmost_child(head, guard);
        }
    }

    /// Applies one decision to the leaf holding `key`, retrying on lost races.
    fn write_leaf<T>(
        &self,
        key: &EncodedKey,
        mut decide: impl FnMut(&[ItemPointer]) -> LeafWrite<T>,
    ) -> T {
        let guard = &epoch::pin();
        let (mut id, path) = self.find_leaf(key, guard);
        let mut backoff = Backoff::new(self.max_backoff_spins);
        loop {
            let (head_ptr, head) = self.mapping.load(id, guard);
            let set = match search_leaf(head, key, guard) {
                LeafSearch::Found(set) => set,
                LeafSearch::MoveRight { separator, sibling } => {
                    self.finish_split(&path, id, separator, sibling, guard);
                    id = sibling;
                    continue;
                }
            };

            let (body, outcome) = match decide(&set) {
                LeafWrite::Done(outcome) => return outcome,
                LeafWrite::Post(body, outcome) => (body, outcome),
            };

            let delta = Owned::new(Node::delta(body, head_ptr, head));
            match self.mapping.compare_exchange(id, head_ptr, delta, guard) {
                Ok(_) => {
                    self.stats.record_delta();
                    if head.chain_len + 1 >= self.delta_chain_threshold {
                        self.consolidate(id, &path, guard);
                    }
                    return outcome;
                }
                Err(_) => {
                    self.stats.record_cas_failure();
                    trace!(node = %id, attempt = backoff.attempts(), "leaf delta lost CAS race");
                    backoff.snooze();
                }
            }
        }
    }

    // =========================================================================
    // Structure modifications
    // =========================================================================

    /// Replaces the chain of `id` with a fresh base if it is long enough,
    /// then splits the node if the base is oversized.
    fn consolidate(&self, id: NodeId, path: &[NodeId], guard: &Guard) {
        let (head_ptr, head) = self.mapping.load(id, guard);
        if head.chain_len < self.delta_chain_threshold {
            return;
        }

        let base = if head.is_leaf {
            Node::leaf(consolidate_leaf(head, guard))
        } else {
            Node::inner(consolidate_inner(head, guard))
        };

        match self
            .mapping
            .compare_exchange(id, head_ptr, Owned::new(base), guard)
        {
            Ok(new_head) => {
                // SAFETY: the old chain is no longer reachable from the
                // mapping table; pinned readers keep it alive until they unpin.
                unsafe { retire_chain(head_ptr, guard) };
                self.stats.record_consolidation();
                debug!(node = %id, chain_len = head.chain_len, leaf = head.is_leaf, "consolidated node");
                self.maybe_split(id, new_head, path, guard);
            }
            Err(_) => {
                // Someone else changed the node; the next writer re-checks.
                self.stats.record_cas_failure();
            }
        }
    }

    /// Splits a freshly consolidated node if it holds too many entries.
    fn maybe_split<'g>(
        &self,
        id: NodeId,
        head_ptr: Shared<'g, Node>,
        path: &[NodeId],
        guard: &'g Guard,
    ) {
        // SAFETY: `head_ptr` was just installed and `guard` is still pinned.
        let head = unsafe { head_ptr.deref() };
        let (separator, right) = match &head.body {
            NodeBody::Leaf(base) if base.entries.len() > self.leaf_max_entries => {
                let (separator, right) = base.split_off();
                (separator, Node::leaf(right))
            }
            NodeBody::Inner(base) if base.separators.len() > self.inner_max_entries => {
                let (separator, right) = base.split_off();
                (separator, Node::inner(right))
            }
            _ => return,
        };

        let Some(sibling) = self.mapping.allocate(Owned::new(right)) else {
            warn!(node = %id, "mapping table full; node left oversized");
            return;
        };

        let delta = Node::delta(
            NodeBody::Split {
                separator: separator.clone(),
                sibling,
            },
            head_ptr,
            head,
        );
        match self
            .mapping
            .compare_exchange(id, head_ptr, Owned::new(delta), guard)
        {
            Ok(_) => {
                self.stats.record_split();
                debug!(node = %id, sibling = %sibling, separator = %separator, "split node");
                self.finish_split(path, id, separator, sibling, guard);
            }
            Err(_) => {
                self.stats.record_cas_failure();
                self.mapping.discard(sibling, guard);
            }
        }
    }

    /// Makes the parent of `id` route keys at or above `separator` to
    /// `sibling`. Idempotent; safe to call for a split that is already
    /// reflected in the parent.
    fn finish_split(
        &self,
        path: &[NodeId],
        id: NodeId,
        separator: EncodedKey,
        sibling: NodeId,
        guard: &Guard,
    ) {
        match path.split_last() {
            Some((&parent, grand_path)) => {
                self.post_index_entry(parent, grand_path, id, separator, sibling, guard)
            }
            None => self.install_root(id, separator, sibling, guard),
        }
    }

    fn post_index_entry(
        &self,
        mut parent: NodeId,
        grand_path: &[NodeId],
        child: NodeId,
        separator: EncodedKey,
        sibling: NodeId,
        guard: &Guard,
    ) {
        let mut backoff = Backoff::new(self.max_backoff_spins);
        loop {
            let (head_ptr, head) = self.mapping.load(parent, guard);
            let upper = match route_inner(head, &separator, guard) {
                Route::MoveRight {
                    separator: parent_sep,
                    sibling: parent_sibling,
                } => {
                    self.finish_split(grand_path, parent, parent_sep, parent_sibling, guard);
                    parent = parent_sibling;
                    continue;
                }
                Route::Child { child: routed, .. } if routed == sibling => return,
                Route::Child { child: routed, upper } if routed == child => upper,
                // The parent already moved on past this split.
                Route::Child { .. } => return,
            };

            let delta = Node::delta(
                NodeBody::IndexEntry {
                    separator: separator.clone(),
                    child: sibling,
                    upper,
                },
                head_ptr,
                head,
            );
            match self
                .mapping
                .compare_exchange(parent, head_ptr, Owned::new(delta), guard)
            {
                Ok(_) => {
                    if head.chain_len + 1 >= self.delta_chain_threshold {
                        self.consolidate(parent, grand_path, guard);
                    }
                    return;
                }
                Err(_) => {
                    self.stats.record_cas_failure();
                    trace!(node = %parent, attempt = backoff.attempts(), "index entry lost CAS race");
                    backoff.snooze();
                }
            }
        }
    }

    /// Grows the tree by one level if `id` is still the root.
    fn install_root(&self, id: NodeId, separator: EncodedKey, sibling: NodeId, guard: &Guard) {
        if self.root_id() != id {
            return;
        }
        let root = Node::inner(InnerBase {
            separators: vec![separator],
            children: vec![id, sibling],
            sibling: None,
        });
        let Some(new_root) = self.mapping.allocate(Owned::new(root)) else {
            warn!(node = %id, "mapping table full; root split deferred");
            return;
        };

        match self
            .root
            .compare_exchange(id.0, new_root.0, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.stats.record_root_split();
                debug!(root = %new_root, left = %id, right = %sibling, "installed new root");
            }
            Err(_) => self.mapping.discard(new_root, guard),
        }
    }
}

impl fmt::Debug for BwTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BwTree")
            .field("root", &self.root_id())
            .field("nodes", &self.mapping.allocated())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Hands every record of an unlinked chain to the epoch collector.
///
/// # Safety
///
/// `head` must no longer be reachable from the mapping table.
unsafe fn retire_chain(head: Shared<'_, Node>, guard: &Guard) {
    let mut cur = head;
    // SAFETY: records stay valid until `guard` unpins; destruction is deferred.
    while let Some(node) = unsafe { cur.as_ref() } {
        let next = node.next.load(Ordering::Acquire, guard);
        unsafe { guard.defer_destroy(cur) };
        cur = next;
    }
}
