//! Ordered map behind a single reader-writer lock.
//!
//! Same contract as the Bw-tree with none of its machinery. Useful for small
//! indexes and as the reference model in differential tests.

use crate::container::InsertOutcome;
use crate::key::EncodedKey;
use crate::location::ItemPointer;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// `BTreeMap` from key to location set, guarded by one `RwLock`.
#[derive(Debug, Default)]
pub struct LockedBTree {
    entries: RwLock<BTreeMap<EncodedKey, Vec<ItemPointer>>>,
}

impl LockedBTree {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every location stored under `key`; empty if none.
    pub fn get(&self, key: &EncodedKey) -> Vec<ItemPointer> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }

    /// Adds `location` under `key`. Returns false if the pair was present.
    pub fn insert(&self, key: &EncodedKey, location: ItemPointer) -> bool {
        let mut entries = self.entries.write();
        let set = entries.entry(key.clone()).or_default();
        if set.contains(&location) {
            return false;
        }
        set.push(location);
        true
    }

    /// Adds `location` under `key` unless some existing location satisfies
    /// `reject`. Check and insert happen under one write lock.
    pub fn conditional_insert<F>(
        &self,
        key: &EncodedKey,
        location: ItemPointer,
        reject: F,
    ) -> InsertOutcome
    where
        F: Fn(&ItemPointer) -> bool,
    {
        let mut entries = self.entries.write();
        if let Some(set) = entries.get(key) {
            if set.contains(&location) {
                return InsertOutcome::AlreadyPresent;
            }
            if set.iter().any(&reject) {
                return InsertOutcome::Rejected;
            }
        }
        entries.entry(key.clone()).or_default().push(location);
        InsertOutcome::Inserted
    }

    /// Removes `location` from `key`. Returns false if the pair was absent.
    ///
    /// A key whose last location is removed is dropped from the map.
    pub fn remove(&self, key: &EncodedKey, location: ItemPointer) -> bool {
        let mut entries = self.entries.write();
        let Some(set) = entries.get_mut(key) else {
            return false;
        };
        let before = set.len();
        set.retain(|l| *l != location);
        let removed = set.len() != before;
        if set.is_empty() {
            entries.remove(key);
        }
        removed
    }

    /// Returns every entry in key order.
    pub fn scan_all(&self) -> Vec<(EncodedKey, Vec<ItemPointer>)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns the number of keys holding at least one location.
    pub fn len_keys(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(v: u16) -> EncodedKey {
        EncodedKey::from_bytes(v.to_be_bytes().to_vec())
    }

    #[test]
    fn test_insert_remove() {
        let map = LockedBTree::new();
        let a = ItemPointer::new(1, 1);
        let b = ItemPointer::new(2, 4);

        assert!(map.insert(&key(3), a));
        assert!(!map.insert(&key(3), a));
        assert!(map.insert(&key(3), b));
        assert_eq!(map.get(&key(3)), vec![a, b]);

        assert!(map.remove(&key(3), a));
        assert!(!map.remove(&key(3), a));
        assert!(!map.remove(&key(9), a));
        assert!(map.remove(&key(3), b));
        assert!(map.get(&key(3)).is_empty());
        assert_eq!(map.len_keys(), 0);
    }

    #[test]
    fn test_conditional_insert() {
        let map = LockedBTree::new();
        let a = ItemPointer::new(1, 1);
        let b = ItemPointer::new(2, 4);

        assert_eq!(
            map.conditional_insert(&key(1), a, |e| *e != a),
            InsertOutcome::Inserted
        );
        assert_eq!(
            map.conditional_insert(&key(1), a, |e| *e != a),
            InsertOutcome::AlreadyPresent
        );
        assert_eq!(
            map.conditional_insert(&key(1), b, |e| *e != b),
            InsertOutcome::Rejected
        );
        assert_eq!(map.get(&key(1)), vec![a]);
    }

    #[test]
    fn test_scan_all_ordered() {
        let map = LockedBTree::new();
        for v in [5u16, 1, 3] {
            map.insert(&key(v), ItemPointer::new(v as u32, 0));
        }
        let keys: Vec<_> = map.scan_all().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![key(1), key(3), key(5)]);
    }
}
