//! Immutable index descriptor.

use crate::catalog::Schema;
use crate::key::check_width;
use arbor_common::{ArborError, Result, Value};
use std::fmt;

/// Concrete ordered-container implementation backing an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexKind {
    /// Latch-free Bw-tree.
    #[default]
    BwTree,
    /// Ordered map behind a single reader-writer lock.
    BTree,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::BwTree => write!(f, "BWTree"),
            IndexKind::BTree => write!(f, "BTree"),
        }
    }
}

/// Everything needed to build and use one index.
///
/// Validated once at construction and never mutated afterwards, so it can be
/// shared freely between threads.
#[derive(Debug, Clone)]
pub struct IndexMetadata {
    name: String,
    oid: u32,
    tuple_schema: Schema,
    key_schema: Schema,
    key_attrs: Vec<usize>,
    unique: bool,
    kind: IndexKind,
}

impl IndexMetadata {
    /// Creates and validates index metadata.
    ///
    /// `key_attrs[i]` is the tuple ordinal that key column `i` is taken from.
    /// Fails with `InvalidSchema` if an ordinal is out of range, the key
    /// schema and ordinal list differ in length, the key is empty, or a key
    /// column is not a fixed-width type matching its tuple column.
    pub fn new(
        name: impl Into<String>,
        oid: u32,
        tuple_schema: Schema,
        mut key_schema: Schema,
        key_attrs: Vec<usize>,
        unique: bool,
        kind: IndexKind,
    ) -> Result<Self> {
        let name = name.into();

        if key_attrs.is_empty() {
            return Err(invalid(&name, "index key has no columns".to_string()));
        }
        if key_schema.column_count() != key_attrs.len() {
            return Err(invalid(
                &name,
                format!(
                    "key schema has {} columns but {} key ordinals were given",
                    key_schema.column_count(),
                    key_attrs.len()
                ),
            ));
        }
        let declared = key_schema.indexed_columns();
        if !declared.is_empty() && declared != key_attrs.as_slice() {
            return Err(invalid(
                &name,
                format!(
                    "key schema indexes columns {:?} but key ordinals are {:?}",
                    key_schema.indexed_columns(),
                    key_attrs
                ),
            ));
        }

        for (key_idx, &ordinal) in key_attrs.iter().enumerate() {
            let Some(tuple_column) = tuple_schema.column(ordinal) else {
                return Err(invalid(
                    &name,
                    format!(
                        "key ordinal {} out of range for tuple schema of {} columns",
                        ordinal,
                        tuple_schema.column_count()
                    ),
                ));
            };
            let key_column = &key_schema.columns()[key_idx];
            check_width(key_column).map_err(|e| invalid(&name, e.to_string()))?;
            if key_column.type_id != tuple_column.type_id {
                return Err(invalid(
                    &name,
                    format!(
                        "key column {} is {} but tuple column {} is {}",
                        key_column.name,
                        key_column.type_id,
                        tuple_column.name,
                        tuple_column.type_id
                    ),
                ));
            }
            if tuple_column.nullable && !key_column.nullable {
                return Err(invalid(
                    &name,
                    format!(
                        "key column {} is NOT NULL but tuple column {} is nullable",
                        key_column.name, tuple_column.name
                    ),
                ));
            }
        }

        key_schema.set_indexed_columns(key_attrs.clone());

        Ok(Self {
            name,
            oid,
            tuple_schema,
            key_schema,
            key_attrs,
            unique,
            kind,
        })
    }

    /// Returns the index name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the index oid.
    #[inline]
    pub fn oid(&self) -> u32 {
        self.oid
    }

    /// Returns the schema of the indexed tuples.
    #[inline]
    pub fn tuple_schema(&self) -> &Schema {
        &self.tuple_schema
    }

    /// Returns the key schema.
    #[inline]
    pub fn key_schema(&self) -> &Schema {
        &self.key_schema
    }

    /// Returns the tuple ordinals making up the key, in key order.
    #[inline]
    pub fn key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    /// Returns true if the index enforces unique keys.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the container kind.
    #[inline]
    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Returns the number of key columns.
    #[inline]
    pub fn key_column_count(&self) -> usize {
        self.key_attrs.len()
    }

    /// Extracts the key values from a full tuple.
    pub fn project_key(&self, tuple: &[Value]) -> Result<Vec<Value>> {
        if tuple.len() != self.tuple_schema.column_count() {
            return Err(ArborError::KeyColumnCount {
                expected: self.tuple_schema.column_count(),
                actual: tuple.len(),
            });
        }
        Ok(self.key_attrs.iter().map(|&i| tuple[i].clone()).collect())
    }
}

fn invalid(index: &str, reason: String) -> ArborError {
    ArborError::InvalidSchema(format!("index {}: {}", index, reason))
}
