//! The closed set of ordered containers an index can sit on.

use crate::btree::LockedBTree;
use crate::bwtree::BwTree;
use crate::key::EncodedKey;
use crate::location::ItemPointer;
use crate::metadata::IndexKind;
use arbor_common::{IndexConfig, Result};

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The pair was added.
    Inserted,
    /// The exact pair was already stored; nothing changed.
    AlreadyPresent,
    /// An existing location matched the reject predicate; nothing changed.
    Rejected,
}

/// Ordered map from encoded key to location set.
///
/// Every variant offers the same operations with the same semantics:
/// duplicate inserts and removals of absent pairs are no-ops, and a key with
/// no locations reads as absent.
#[derive(Debug)]
pub enum OrderedContainer {
    BwTree(BwTree),
    BTree(LockedBTree),
}

impl OrderedContainer {
    /// Builds an empty container of the given kind.
    pub fn new(kind: IndexKind, config: &IndexConfig) -> Result<Self> {
        Ok(match kind {
            IndexKind::BwTree => OrderedContainer::BwTree(BwTree::new(config)?),
            IndexKind::BTree => OrderedContainer::BTree(LockedBTree::new()),
        })
    }

    /// Returns the kind of this container.
    pub fn kind(&self) -> IndexKind {
        match self {
            OrderedContainer::BwTree(_) => IndexKind::BwTree,
            OrderedContainer::BTree(_) => IndexKind::BTree,
        }
    }

    #[inline]
    pub fn get(&self, key: &EncodedKey) -> Vec<ItemPointer> {
        match self {
            OrderedContainer::BwTree(tree) => tree.get(key),
            OrderedContainer::BTree(map) => map.get(key),
        }
    }

    #[inline]
    pub fn insert(&self, key: &EncodedKey, location: ItemPointer) -> bool {
        match self {
            OrderedContainer::BwTree(tree) => tree.insert(key, location),
            OrderedContainer::BTree(map) => map.insert(key, location),
        }
    }

    #[inline]
    pub fn conditional_insert<F>(
        &self,
        key: &EncodedKey,
        location: ItemPointer,
        reject: F,
    ) -> InsertOutcome
    where
        F: Fn(&ItemPointer) -> bool,
    {
        match self {
            OrderedContainer::BwTree(tree) => tree.conditional_insert(key, location, reject),
            OrderedContainer::BTree(map) => map.conditional_insert(key, location, reject),
        }
    }

    #[inline]
    pub fn remove(&self, key: &EncodedKey, location: ItemPointer) -> bool {
        match self {
            OrderedContainer::BwTree(tree) => tree.remove(key, location),
            OrderedContainer::BTree(map) => map.remove(key, location),
        }
    }

    pub fn scan_all(&self) -> Vec<(EncodedKey, Vec<ItemPointer>)> {
        match self {
            OrderedContainer::BwTree(tree) => tree.scan_all(),
            OrderedContainer::BTree(map) => map.scan_all(),
        }
    }

    pub fn len_keys(&self) -> usize {
        match self {
            OrderedContainer::BwTree(tree) => tree.len_keys(),
            OrderedContainer::BTree(map) => map.len_keys(),
        }
    }

    /// Returns the Bw-tree if this container is one.
    pub fn as_bwtree(&self) -> Option<&BwTree> {
        match self {
            OrderedContainer::BwTree(tree) => Some(tree),
            OrderedContainer::BTree(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_behave_alike() {
        let config = IndexConfig::default();
        for kind in [IndexKind::BwTree, IndexKind::BTree] {
            let container = OrderedContainer::new(kind, &config).unwrap();
            assert_eq!(container.kind(), kind);

            let k = EncodedKey::from_bytes(vec![1, 2, 3]);
            let l = ItemPointer::new(4, 16);
            assert!(container.insert(&k, l));
            assert!(!container.insert(&k, l));
            assert_eq!(container.get(&k), vec![l]);
            assert_eq!(container.len_keys(), 1);
            assert!(container.remove(&k, l));
            assert!(!container.remove(&k, l));
            assert!(container.get(&k).is_empty());
            assert_eq!(container.as_bwtree().is_some(), kind == IndexKind::BwTree);
        }
    }
}
