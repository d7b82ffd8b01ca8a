//! Runtime column values.

use crate::types::TypeId;
use std::fmt;

/// A single typed column value.
///
/// Each variant carries exactly the Rust type of its column type, so the
/// width of the value is part of its tag. `Value::Int16(5)` and
/// `Value::Int32(5)` are different values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Hash)]
pub enum Value {
    /// SQL NULL.
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    Varchar(String),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Builds a value of the given integer type from an i64, the way test
    /// fixtures and literal binding produce them.
    ///
    /// Returns None if the type is not an integer type or the value does not
    /// fit its range.
    pub fn integer(type_id: TypeId, v: i64) -> Option<Self> {
        let value = match type_id {
            TypeId::Int8 => Value::Int8(i8::try_from(v).ok()?),
            TypeId::Int16 => Value::Int16(i16::try_from(v).ok()?),
            TypeId::Int32 => Value::Int32(i32::try_from(v).ok()?),
            TypeId::Int64 => Value::Int64(v),
            TypeId::UInt8 => Value::UInt8(u8::try_from(v).ok()?),
            TypeId::UInt16 => Value::UInt16(u16::try_from(v).ok()?),
            TypeId::UInt32 => Value::UInt32(u32::try_from(v).ok()?),
            TypeId::UInt64 => Value::UInt64(u64::try_from(v).ok()?),
            _ => return None,
        };
        Some(value)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the type of this value. NULL reports `TypeId::Null`.
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Null => TypeId::Null,
            Value::Boolean(_) => TypeId::Boolean,
            Value::Int8(_) => TypeId::Int8,
            Value::Int16(_) => TypeId::Int16,
            Value::Int32(_) => TypeId::Int32,
            Value::Int64(_) => TypeId::Int64,
            Value::UInt8(_) => TypeId::UInt8,
            Value::UInt16(_) => TypeId::UInt16,
            Value::UInt32(_) => TypeId::UInt32,
            Value::UInt64(_) => TypeId::UInt64,
            Value::Timestamp(_) => TypeId::Timestamp,
            Value::Varchar(_) => TypeId::Varchar,
        }
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}us", v),
            Value::Varchar(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}
