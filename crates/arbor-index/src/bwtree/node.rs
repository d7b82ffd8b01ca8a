//! Bw-tree node records and chain evaluation.
//!
//! A logical node is a chain of immutable records reached from its mapping
//! table slot: zero or more delta records on top of exactly one base record.
//!
//! ```text
//! slot ──► [Insert k3] ──► [Delete k1] ──► [Split s, #9] ──► [LeafBase]
//!          newest                                            oldest
//! ```
//!
//! Readers evaluate a chain newest to oldest. Records never change after
//! publication except for their `next` link, which is set before the record
//! is CAS-installed and never touched again.

use super::mapping::NodeId;
use crate::key::EncodedKey;
use crate::location::ItemPointer;
use crossbeam_epoch::{Atomic, Guard, Shared};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

/// Locations stored under one key.
pub(crate) type LocationSet = Vec<ItemPointer>;

/// Consolidated leaf contents.
#[derive(Debug, Clone, Default)]
pub(crate) struct LeafBase {
    /// Sorted by key. Every set is non-empty.
    pub(crate) entries: Vec<(EncodedKey, LocationSet)>,
    /// High key (exclusive) and right sibling; None for the rightmost leaf.
    pub(crate) sibling: Option<(EncodedKey, NodeId)>,
}

impl LeafBase {
    /// Returns the locations stored under `key` in this base.
    fn get(&self, key: &EncodedKey) -> Option<&LocationSet> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(key))
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    /// Splits off the upper half. Returns the separator (first key of the
    /// upper half) and the new right sibling's contents.
    pub(crate) fn split_off(&self) -> (EncodedKey, LeafBase) {
        let mid = self.entries.len() / 2;
        let separator = self.entries[mid].0.clone();
        let right = LeafBase {
            entries: self.entries[mid..].to_vec(),
            sibling: self.sibling.clone(),
        };
        (separator, right)
    }
}

/// Consolidated inner node contents.
///
/// `children[0]` covers keys below `separators[0]`; `children[i]` covers
/// `[separators[i - 1], separators[i])`; the last child runs up to the high key.
#[derive(Debug, Clone)]
pub(crate) struct InnerBase {
    pub(crate) separators: Vec<EncodedKey>,
    pub(crate) children: Vec<NodeId>,
    /// High key (exclusive) and right sibling; None for the rightmost node.
    pub(crate) sibling: Option<(EncodedKey, NodeId)>,
}

impl InnerBase {
    /// Splits off the upper half. The middle separator moves up to the
    /// parent and is not kept on either side.
    pub(crate) fn split_off(&self) -> (EncodedKey, InnerBase) {
        let mid = self.separators.len() / 2;
        let separator = self.separators[mid].clone();
        let right = InnerBase {
            separators: self.separators[mid + 1..].to_vec(),
            children: self.children[mid + 1..].to_vec(),
            sibling: self.sibling.clone(),
        };
        (separator, right)
    }
}

/// Payload of one chain record.
#[derive(Debug)]
pub(crate) enum NodeBody {
    Leaf(LeafBase),
    Inner(InnerBase),
    /// Adds `location` under `key`.
    Insert {
        key: EncodedKey,
        location: ItemPointer,
    },
    /// Removes `location` from `key`.
    Delete {
        key: EncodedKey,
        location: ItemPointer,
    },
    /// Keys at or above `separator` now live in `sibling`.
    Split {
        separator: EncodedKey,
        sibling: NodeId,
    },
    /// Inner-node delta: keys in `[separator, upper)` route to `child`.
    IndexEntry {
        separator: EncodedKey,
        child: NodeId,
        upper: Option<EncodedKey>,
    },
}

/// One record of a delta chain.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) body: NodeBody,
    /// Next older record; null for a base.
    pub(crate) next: Atomic<Node>,
    /// Number of delta records from here down to the base.
    pub(crate) chain_len: usize,
    pub(crate) is_leaf: bool,
}

impl Node {
    /// Creates a leaf base record.
    pub(crate) fn leaf(base: LeafBase) -> Self {
        Self {
            body: NodeBody::Leaf(base),
            next: Atomic::null(),
            chain_len: 0,
            is_leaf: true,
        }
    }

    /// Creates an inner base record.
    pub(crate) fn inner(base: InnerBase) -> Self {
        Self {
            body: NodeBody::Inner(base),
            next: Atomic::null(),
            chain_len: 0,
            is_leaf: false,
        }
    }

    /// Creates a delta record to be installed on top of `head`.
    pub(crate) fn delta(body: NodeBody, head: Shared<'_, Node>, head_ref: &Node) -> Self {
        Self {
            body,
            next: Atomic::from(head),
            chain_len: head_ref.chain_len + 1,
            is_leaf: head_ref.is_leaf,
        }
    }
}

/// Outcome of evaluating a leaf chain for one key.
#[derive(Debug)]
pub(crate) enum LeafSearch {
    /// The key belongs to this leaf; these are its current locations.
    Found(LocationSet),
    /// The key is at or above `separator`; continue at `sibling`.
    MoveRight {
        separator: EncodedKey,
        sibling: NodeId,
    },
}

/// Outcome of routing a key through an inner chain.
#[derive(Debug)]
pub(crate) enum Route {
    /// Descend to `child`, whose range in this node ends at `upper`.
    Child {
        child: NodeId,
        upper: Option<EncodedKey>,
    },
    /// The key is at or above `separator`; continue at `sibling`.
    MoveRight {
        separator: EncodedKey,
        sibling: NodeId,
    },
}

/// Follows the `next` link of a delta record.
#[inline]
pub(crate) fn next_record<'g>(node: &Node, guard: &'g Guard) -> &'g Node {
    let next = node.next.load(Ordering::Acquire, guard);
    // SAFETY: records are reclaimed only via `defer_destroy` after their
    // chain has been unlinked from the mapping table, and `guard` is pinned.
    match unsafe { next.as_ref() } {
        Some(next) => next,
        None => panic!("bw-tree corrupted: delta chain ends without a base"),
    }
}

/// Evaluates a leaf chain for `key`.
pub(crate) fn search_leaf(head: &Node, key: &EncodedKey, guard: &Guard) -> LeafSearch {
    // Deltas for `key`, newest first.
    let mut pending: Vec<(bool, ItemPointer)> = Vec::new();
    let mut node = head;
    loop {
        match &node.body {
            NodeBody::Insert { key: k, location } if k == key => pending.push((true, *location)),
            NodeBody::Delete { key: k, location } if k == key => pending.push((false, *location)),
            NodeBody::Insert { .. } | NodeBody::Delete { .. } => {}
            NodeBody::Split { separator, sibling } => {
                if key >= separator {
                    return LeafSearch::MoveRight {
                        separator: separator.clone(),
                        sibling: *sibling,
                    };
                }
            }
            NodeBody::Leaf(base) => {
                if let Some((high, right)) = &base.sibling {
                    if key >= high {
                        return LeafSearch::MoveRight {
                            separator: high.clone(),
                            sibling: *right,
                        };
                    }
                }
                let mut set = base.get(key).cloned().unwrap_or_default();
                for (is_insert, location) in pending.iter().rev() {
                    apply(&mut set, *is_insert, *location);
                }
                return LeafSearch::Found(set);
            }
            NodeBody::Inner(_) | NodeBody::IndexEntry { .. } => {
                panic!("bw-tree corrupted: inner record in a leaf chain")
            }
        }
        node = next_record(node, guard);
    }
}

/// Routes `key` through an inner chain.
pub(crate) fn route_inner(head: &Node, key: &EncodedKey, guard: &Guard) -> Route {
    // Smallest separator above `key` seen in newer records. It bounds the
    // range of whichever child is finally chosen.
    let mut bound: Option<EncodedKey> = None;
    let mut node = head;
    loop {
        match &node.body {
            NodeBody::IndexEntry {
                separator,
                child,
                upper,
            } => {
                if key < separator {
                    tighten(&mut bound, separator);
                } else if upper.as_ref().is_none_or(|u| key < u) {
                    let mut upper = upper.clone();
                    if let Some(b) = &bound {
                        tighten(&mut upper, b);
                    }
                    return Route::Child {
                        child: *child,
                        upper,
                    };
                }
            }
            NodeBody::Split { separator, sibling } => {
                if key >= separator {
                    return Route::MoveRight {
                        separator: separator.clone(),
                        sibling: *sibling,
                    };
                }
                tighten(&mut bound, separator);
            }
            NodeBody::Inner(base) => {
                if let Some((high, right)) = &base.sibling {
                    if key >= high {
                        return Route::MoveRight {
                            separator: high.clone(),
                            sibling: *right,
                        };
                    }
                }
                let idx = base.separators.partition_point(|s| s <= key);
                let mut upper = base
                    .separators
                    .get(idx)
                    .or(base.sibling.as_ref().map(|(high, _)| high))
                    .cloned();
                if let Some(b) = &bound {
                    tighten(&mut upper, b);
                }
                return Route::Child {
                    child: base.children[idx],
                    upper,
                };
            }
            NodeBody::Leaf(_) | NodeBody::Insert { .. } | NodeBody::Delete { .. } => {
                panic!("bw-tree corrupted: leaf record in an inner chain")
            }
        }
        node = next_record(node, guard);
    }
}

/// Returns the leftmost child of an inner chain.
///
/// Splits only ever move the upper part of a node away, so the first child
/// of the base is still the leftmost child of the logical node.
pub(crate) fn leftmost_child(head: &Node, guard: &Guard) -> NodeId {
    let mut node = head;
    loop {
        match &node.body {
            NodeBody::Inner(base) => return base.children[0],
            NodeBody::Leaf(_) => panic!("bw-tree corrupted: leaf base in an inner chain"),
            _ => node = next_record(node, guard),
        }
    }
}

/// Builds the base that reflects the net effect of a leaf chain.
pub(crate) fn consolidate_leaf(head: &Node, guard: &Guard) -> LeafBase {
    let mut deltas: Vec<(bool, &EncodedKey, ItemPointer)> = Vec::with_capacity(head.chain_len);
    let mut split: Option<(EncodedKey, NodeId)> = None;
    let mut node = head;
    let base = loop {
        match &node.body {
            NodeBody::Leaf(base) => break base,
            NodeBody::Insert { key, location } => deltas.push((true, key, *location)),
            NodeBody::Delete { key, location } => deltas.push((false, key, *location)),
            NodeBody::Split { separator, sibling } => {
                if split.is_none() {
                    split = Some((separator.clone(), *sibling));
                }
            }
            NodeBody::Inner(_) | NodeBody::IndexEntry { .. } => {
                panic!("bw-tree corrupted: inner record in a leaf chain")
            }
        }
        node = next_record(node, guard);
    };

    let sibling = split.or_else(|| base.sibling.clone());
    let mut entries: BTreeMap<EncodedKey, LocationSet> = base.entries.iter().cloned().collect();
    for (is_insert, key, location) in deltas.into_iter().rev() {
        apply(entries.entry(key.clone()).or_default(), is_insert, location);
    }

    let entries = entries
        .into_iter()
        .filter(|(key, set)| {
            !set.is_empty() && sibling.as_ref().is_none_or(|(high, _)| key < high)
        })
        .collect();
    LeafBase { entries, sibling }
}

/// Builds the base that reflects the net effect of an inner chain.
pub(crate) fn consolidate_inner(head: &Node, guard: &Guard) -> InnerBase {
    let mut entries: Vec<(&EncodedKey, NodeId)> = Vec::with_capacity(head.chain_len);
    let mut split: Option<(EncodedKey, NodeId)> = None;
    let mut node = head;
    let base = loop {
        match &node.body {
            NodeBody::Inner(base) => break base,
            NodeBody::IndexEntry {
                separator, child, ..
            } => entries.push((separator, *child)),
            NodeBody::Split { separator, sibling } => {
                if split.is_none() {
                    split = Some((separator.clone(), *sibling));
                }
            }
            NodeBody::Leaf(_) | NodeBody::Insert { .. } | NodeBody::Delete { .. } => {
                panic!("bw-tree corrupted: leaf record in an inner chain")
            }
        }
        node = next_record(node, guard);
    };

    let sibling = split.or_else(|| base.sibling.clone());
    let mut separators = base.separators.clone();
    let mut children = base.children.clone();
    for (separator, child) in entries.into_iter().rev() {
        let pos = separators.partition_point(|s| s < separator);
        if separators.get(pos) == Some(separator) {
            continue;
        }
        separators.insert(pos, separator.clone());
        children.insert(pos + 1, child);
    }

    if let Some((high, _)) = &sibling {
        let cut = separators.partition_point(|s| s < high);
        separators.truncate(cut);
        children.truncate(cut + 1);
    }
    InnerBase {
        separators,
        children,
        sibling,
    }
}

fn apply(set: &mut LocationSet, is_insert: bool, location: ItemPointer) {
    if is_insert {
        if !set.contains(&location) {
            set.push(location);
        }
    } else {
        set.retain(|l| *l != location);
    }
}

fn tighten(bound: &mut Option<EncodedKey>, candidate: &EncodedKey) {
    if bound.as_ref().is_none_or(|b| candidate < b) {
        *bound = Some(candidate.clone());
    }
}
