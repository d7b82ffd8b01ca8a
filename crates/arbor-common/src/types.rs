//! Type identifiers for Arbor column values.

use serde::{Deserialize, Serialize};

/// Identifier for the column types Arbor understands.
///
/// Fixed-width types can participate in index keys. Variable-length types
/// may appear in a tuple schema but never in a key schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeId {
    // Null type
    Null = 0,

    // Boolean
    Boolean = 1,

    // Signed integer types
    Int8 = 10,
    Int16 = 11,
    Int32 = 12,
    Int64 = 13,

    // Unsigned integer types
    UInt8 = 20,
    UInt16 = 21,
    UInt32 = 22,
    UInt64 = 23,

    // String types
    Varchar = 51,

    // Date/Time types
    Timestamp = 72,
}

impl TypeId {
    /// Returns the fixed byte size for this type, or None for variable-length types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            TypeId::Null => Some(0),
            TypeId::Boolean => Some(1),

            TypeId::Int8 | TypeId::UInt8 => Some(1),
            TypeId::Int16 | TypeId::UInt16 => Some(2),
            TypeId::Int32 | TypeId::UInt32 => Some(4),
            TypeId::Int64 | TypeId::UInt64 => Some(8),

            TypeId::Timestamp => Some(8),

            TypeId::Varchar => None,
        }
    }

    /// Returns true if this type is a signed integer type.
    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            TypeId::Int8 | TypeId::Int16 | TypeId::Int32 | TypeId::Int64
        )
    }

    /// Returns true if this type is an integer type (signed or unsigned).
    pub fn is_integer(&self) -> bool {
        self.is_signed_integer()
            || matches!(
                self,
                TypeId::UInt8 | TypeId::UInt16 | TypeId::UInt32 | TypeId::UInt64
            )
    }

    /// Returns true if values of this type can be encoded into an index key.
    pub fn is_key_encodable(&self) -> bool {
        self.is_integer() || matches!(self, TypeId::Boolean | TypeId::Timestamp)
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TypeId::Null => "NULL",
            TypeId::Boolean => "BOOLEAN",
            TypeId::Int8 => "INT8",
            TypeId::Int16 => "INT16",
            TypeId::Int32 => "INT32",
            TypeId::Int64 => "INT64",
            TypeId::UInt8 => "UINT8",
            TypeId::UInt16 => "UINT16",
            TypeId::UInt32 => "UINT32",
            TypeId::UInt64 => "UINT64",
            TypeId::Varchar => "VARCHAR",
            TypeId::Timestamp => "TIMESTAMP",
        };
        write!(f, "{}", name)
    }
}
