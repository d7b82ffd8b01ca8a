//! Mapping table from logical node ids to delta chain heads.

use super::constants::MAPPING_CHUNK_SIZE;
use super::node::Node;
use crossbeam_epoch::{self as epoch, Atomic, CompareExchangeError, Guard, Owned, Shared};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable logical identifier of a tree node.
///
/// Parents and siblings refer to each other only through these ids, so a
/// node can be replaced (new delta, new base) with a single CAS on its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Chunk = Box<[Atomic<Node>]>;

/// Chunked array of atomic slots.
///
/// Chunks are allocated on first use so an index with a large configured
/// capacity only pays for the ids it hands out. Ids are never reused.
pub(crate) struct MappingTable {
    chunks: Box<[OnceLock<Chunk>]>,
    next_id: AtomicU64,
    capacity: u64,
}

impl MappingTable {
    /// Creates a table able to hold `capacity` node ids.
    pub(crate) fn new(capacity: usize) -> Self {
        let num_chunks = capacity.div_ceil(MAPPING_CHUNK_SIZE);
        let chunks = (0..num_chunks).map(|_| OnceLock::new()).collect();
        Self {
            chunks,
            next_id: AtomicU64::new(0),
            capacity: capacity as u64,
        }
    }

    /// Publishes `node` under a fresh id.
    ///
    /// Returns None once the table is full; the node is dropped.
    pub(crate) fn allocate(&self, node: Owned<Node>) -> Option<NodeId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id >= self.capacity {
            return None;
        }
        let chunk = self.chunks[Self::chunk_index(id)].get_or_init(|| {
            (0..MAPPING_CHUNK_SIZE)
                .map(|_| Atomic::null())
                .collect::<Vec<_>>()
                .into_boxed_slice()
        });
        chunk[Self::slot_index(id)].store(node, Ordering::Release);
        Some(NodeId(id))
    }

    /// Loads the current chain head of `id`.
    ///
    /// Panics if `id` was never published: every id reachable from the tree
    /// is published before it is linked, so anything else is corruption.
    #[inline]
    pub(crate) fn load<'g>(&self, id: NodeId, guard: &'g Guard) -> (Shared<'g, Node>, &'g Node) {
        let head = self.slot(id).load(Ordering::Acquire, guard);
        // SAFETY: chain records are only freed through `Guard::defer_destroy`
        // after being unlinked, and the caller holds `guard`.
        match unsafe { head.as_ref() } {
            Some(node) => (head, node),
            None => panic!("bw-tree corrupted: node {} has an empty slot", id),
        }
    }

    /// Swaps the head of `id` from `current` to `new`.
    #[inline]
    pub(crate) fn compare_exchange<'g>(
        &self,
        id: NodeId,
        current: Shared<'g, Node>,
        new: Owned<Node>,
        guard: &'g Guard,
    ) -> Result<Shared<'g, Node>, CompareExchangeError<'g, Node, Owned<Node>>> {
        self.slot(id).compare_exchange(
            current,
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
            guard,
        )
    }

    /// Empties a slot that was published but never linked into the tree,
    /// e.g. the sibling of a split that lost its CAS.
    pub(crate) fn discard(&self, id: NodeId, guard: &Guard) {
        let old = self.slot(id).swap(Shared::null(), Ordering::AcqRel, guard);
        if !old.is_null() {
            // SAFETY: the slot is unreachable from the tree; deferring keeps
            // this correct even if a reader somehow raced on the id.
            unsafe { guard.defer_destroy(old) };
        }
    }

    /// Number of ids handed out so far.
    pub(crate) fn allocated(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed).min(self.capacity)
    }

    #[inline]
    fn slot(&self, id: NodeId) -> &Atomic<Node> {
        let chunk = self
            .chunks
            .get(Self::chunk_index(id.0))
            .and_then(OnceLock::get);
        match chunk {
            Some(chunk) => &chunk[Self::slot_index(id.0)],
            None => panic!("bw-tree corrupted: node {} was never allocated", id),
        }
    }

    #[inline]
    fn chunk_index(id: u64) -> usize {
        id as usize / MAPPING_CHUNK_SIZE
    }

    #[inline]
    fn slot_index(id: u64) -> usize {
        id as usize % MAPPING_CHUNK_SIZE
    }
}

impl Drop for MappingTable {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no thread can be traversing the table.
        // Every live record belongs to exactly one slot's chain; retired
        // chains were unlinked earlier and are owned by the epoch collector.
        unsafe {
            let guard = epoch::unprotected();
            for chunk in self.chunks.iter().filter_map(OnceLock::get) {
                for slot in chunk.iter() {
                    let mut cur = slot.load(Ordering::Relaxed, guard);
                    while let Some(node) = cur.as_ref() {
                        let next = node.next.load(Ordering::Relaxed, guard);
                        drop(cur.into_owned());
                        cur = next;
                    }
                }
            }
        }
    }
}
