//! Column descriptors and schemas consumed by the index.
//!
//! The catalog that owns table definitions lives outside this crate. These
//! types carry just enough of it for key encoding and metadata validation.

use arbor_common::TypeId;

/// Descriptor of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Declared type.
    pub type_id: TypeId,
    /// Declared width in bytes (0 for variable-length columns).
    pub length: usize,
    /// Column name.
    pub name: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
}

impl Column {
    /// Creates a column whose width is the natural width of its type.
    pub fn new(type_id: TypeId, name: impl Into<String>, nullable: bool) -> Self {
        Self {
            type_id,
            length: type_id.fixed_size().unwrap_or(0),
            name: name.into(),
            nullable,
        }
    }

    /// Creates a column with an explicitly declared width.
    pub fn with_length(
        type_id: TypeId,
        length: usize,
        name: impl Into<String>,
        nullable: bool,
    ) -> Self {
        Self {
            type_id,
            length,
            name: name.into(),
            nullable,
        }
    }

    /// Bytes this column occupies inside an encoded key, including the
    /// null indicator of nullable columns.
    pub fn key_width(&self) -> usize {
        self.length + self.nullable as usize
    }
}

/// Ordered list of columns.
///
/// When used as a key schema, `indexed_columns` records which tuple columns
/// the key columns are projected from, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    indexed_columns: Vec<usize>,
}

impl Schema {
    /// Creates a schema from its columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            indexed_columns: Vec::new(),
        }
    }

    /// Records the tuple ordinals this key schema is built from.
    pub fn set_indexed_columns(&mut self, ordinals: Vec<usize>) {
        self.indexed_columns = ordinals;
    }

    /// Builder form of [`Schema::set_indexed_columns`].
    pub fn with_indexed_columns(mut self, ordinals: Vec<usize>) -> Self {
        self.indexed_columns = ordinals;
        self
    }

    /// Returns the columns in order.
    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the column at `idx`.
    #[inline]
    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the tuple ordinals recorded for a key schema.
    #[inline]
    pub fn indexed_columns(&self) -> &[usize] {
        &self.indexed_columns
    }

    /// Total encoded key length for this schema.
    pub fn key_length(&self) -> usize {
        self.columns.iter().map(Column::key_width).sum()
    }
}
