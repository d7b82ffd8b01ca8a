//! Bw-tree operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated with relaxed atomics on the hot path.
#[derive(Debug, Default)]
pub struct BwTreeStats {
    delta_posts: AtomicU64,
    cas_failures: AtomicU64,
    consolidations: AtomicU64,
    splits: AtomicU64,
    root_splits: AtomicU64,
}

impl BwTreeStats {
    #[inline]
    pub(crate) fn record_delta(&self) {
        self.delta_posts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_cas_failure(&self) {
        self.cas_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_consolidation(&self) {
        self.consolidations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_split(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_root_split(&self) {
        self.root_splits.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    ///
    /// Counters are read one by one, so a snapshot taken under load is not
    /// an atomic cut across all of them.
    pub fn snapshot(&self) -> BwTreeStatsSnapshot {
        BwTreeStatsSnapshot {
            delta_posts: self.delta_posts.load(Ordering::Relaxed),
            cas_failures: self.cas_failures.load(Ordering::Relaxed),
            consolidations: self.consolidations.load(Ordering::Relaxed),
            splits: self.splits.load(Ordering::Relaxed),
            root_splits: self.root_splits.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.delta_posts.store(0, Ordering::Relaxed);
        self.cas_failures.store(0, Ordering::Relaxed);
        self.consolidations.store(0, Ordering::Relaxed);
        self.splits.store(0, Ordering::Relaxed);
        self.root_splits.store(0, Ordering::Relaxed);
    }
}

/// Statistics about a Bw-tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BwTreeStatsSnapshot {
    /// Insert and delete deltas successfully posted on leaves.
    pub delta_posts: u64,
    /// Lost compare-and-swap races of any kind.
    pub cas_failures: u64,
    /// Chains replaced by a fresh base.
    pub consolidations: u64,
    /// Node splits, including root splits.
    pub splits: u64,
    /// Times a new root was installed.
    pub root_splits: u64,
}
