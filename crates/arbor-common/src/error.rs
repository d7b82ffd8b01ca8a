//! Error types for Arbor.

use thiserror::Error;

/// Result type alias using ArborError.
pub type Result<T> = std::result::Result<T, ArborError>;

/// Errors that can occur in Arbor index operations.
#[derive(Debug, Error)]
pub enum ArborError {
    // Type errors
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Key column count mismatch: expected {expected}, got {actual}")]
    KeyColumnCount { expected: usize, actual: usize },

    #[error("Null value not allowed in column {column}")]
    NullNotAllowed { column: String },

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Key decode failed: {0}")]
    KeyDecode(String),

    // Catalog errors
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    // Constraint errors
    #[error("Unique constraint violation on index {index} for key {key}")]
    UniqueConstraintViolation { index: String, key: String },

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
