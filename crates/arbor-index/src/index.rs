//! Index facade.
//!
//! Turns typed key values into encoded keys and applies the uniqueness
//! policy before delegating to the ordered container.

use crate::container::{InsertOutcome, OrderedContainer};
use crate::key::{EncodedKey, KeyEncoder, format_key};
use crate::location::ItemPointer;
use crate::metadata::{IndexKind, IndexMetadata};
use arbor_common::{ArborError, Result, Value};
use std::sync::Arc;

/// A secondary index: metadata plus the container holding its entries.
///
/// All operations take `&self` and may be called from any number of threads.
#[derive(Debug)]
pub struct Index {
    metadata: Arc<IndexMetadata>,
    container: OrderedContainer,
}

impl Index {
    pub(crate) fn new(metadata: Arc<IndexMetadata>, container: OrderedContainer) -> Self {
        Self {
            metadata,
            container,
        }
    }

    // =========================================================================
    // Key-based operations
    // =========================================================================

    /// Adds `location` under `key`.
    ///
    /// On a unique index, fails with `UniqueConstraintViolation` if the key
    /// already maps to a different location; the index is left unchanged.
    /// Re-inserting a stored pair succeeds without effect.
    pub fn insert_entry(&self, key: &[Value], location: ItemPointer) -> Result<()> {
        check_location(location)?;
        let encoded = self.encode(key)?;
        if !self.metadata.is_unique() {
            self.container.insert(&encoded, location);
            return Ok(());
        }

        match self
            .container
            .conditional_insert(&encoded, location, |existing| *existing != location)
        {
            InsertOutcome::Inserted | InsertOutcome::AlreadyPresent => Ok(()),
            InsertOutcome::Rejected => Err(ArborError::UniqueConstraintViolation {
                index: self.metadata.name().to_string(),
                key: format_key(key),
            }),
        }
    }

    /// Adds `location` under `key` unless some location already stored
    /// under `key` satisfies `predicate`.
    ///
    /// Returns false if the insert was rejected. The check and the insert are
    /// atomic with respect to other writers of the same key.
    pub fn cond_insert_entry<F>(
        &self,
        key: &[Value],
        location: ItemPointer,
        predicate: F,
    ) -> Result<bool>
    where
        F: Fn(&ItemPointer) -> bool,
    {
        check_location(location)?;
        let encoded = self.encode(key)?;
        let outcome = self
            .container
            .conditional_insert(&encoded, location, |existing| {
                predicate(existing) || (self.metadata.is_unique() && *existing != location)
            });
        match outcome {
            InsertOutcome::Inserted | InsertOutcome::AlreadyPresent => Ok(true),
            InsertOutcome::Rejected => Ok(false),
        }
    }

    /// Removes `location` from `key`. Returns false if the pair was absent.
    pub fn delete_entry(&self, key: &[Value], location: ItemPointer) -> Result<bool> {
        let encoded = self.encode(key)?;
        Ok(self.container.remove(&encoded, location))
    }

    /// Returns every location stored under `key`; empty if none.
    pub fn scan_key(&self, key: &[Value]) -> Result<Vec<ItemPointer>> {
        let encoded = self.encode(key)?;
        Ok(self.container.get(&encoded))
    }

    /// Returns every key with its locations, in key order.
    pub fn scan_all_keys(&self) -> Result<Vec<(Vec<Value>, Vec<ItemPointer>)>> {
        self.container
            .scan_all()
            .into_iter()
            .map(|(key, locations)| {
                let values = KeyEncoder::decode(&key, self.metadata.key_schema())?;
                Ok((values, locations))
            })
            .collect()
    }

    // =========================================================================
    // Tuple-based operations
    // =========================================================================

    /// Like [`Index::insert_entry`], with the key projected from a full tuple.
    pub fn insert_tuple(&self, tuple: &[Value], location: ItemPointer) -> Result<()> {
        self.insert_entry(&self.metadata.project_key(tuple)?, location)
    }

    /// Like [`Index::delete_entry`], with the key projected from a full tuple.
    pub fn delete_tuple(&self, tuple: &[Value], location: ItemPointer) -> Result<bool> {
        self.delete_entry(&self.metadata.project_key(tuple)?, location)
    }

    /// Like [`Index::scan_key`], with the key projected from a full tuple.
    pub fn scan_tuple(&self, tuple: &[Value]) -> Result<Vec<ItemPointer>> {
        self.scan_key(&self.metadata.project_key(tuple)?)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn metadata(&self) -> &Arc<IndexMetadata> {
        &self.metadata
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    #[inline]
    pub fn oid(&self) -> u32 {
        self.metadata.oid()
    }

    #[inline]
    pub fn is_unique(&self) -> bool {
        self.metadata.is_unique()
    }

    #[inline]
    pub fn kind(&self) -> IndexKind {
        self.container.kind()
    }

    /// Returns the container name, "BWTree" or "BTree".
    pub fn type_name(&self) -> String {
        self.kind().to_string()
    }

    /// Returns the number of keys holding at least one location.
    pub fn key_count(&self) -> usize {
        self.container.len_keys()
    }

    /// Returns the underlying container.
    pub fn container(&self) -> &OrderedContainer {
        &self.container
    }

    fn encode(&self, key: &[Value]) -> Result<EncodedKey> {
        KeyEncoder::encode(key, self.metadata.key_schema())
    }
}

fn check_location(location: ItemPointer) -> Result<()> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(ArborError::InvalidParameter {
            name: "location".to_string(),
            value: location.to_string(),
        })
    }
}
