//! Order-preserving composite key encoding.
//!
//! A key is encoded as one fixed-width segment per key column, concatenated
//! in schema order. Every segment is big-endian so that unsigned byte-wise
//! comparison of two encoded keys gives the same order as comparing the typed
//! values column by column:
//!
//! ```text
//! INT8/16/32/64, TIMESTAMP   two's complement with the sign bit flipped
//! UINT8/16/32/64             plain big-endian
//! BOOLEAN                    0x00 / 0x01
//! nullable column            0x00 + zero padding (NULL) | 0x01 + segment
//! ```
//!
//! Flipping the sign bit maps `i8::MIN..=i8::MAX` onto `0x00..=0xFF`
//! monotonically, so negative values sort before positive ones. NULL sorts
//! before every non-NULL value of a nullable column.

use crate::catalog::{Column, Schema};
use arbor_common::{ArborError, Result, TypeId, Value};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Null indicator byte for a NULL in a nullable column.
const NULL_MARKER: u8 = 0x00;

/// Null indicator byte for a present value in a nullable column.
const PRESENT_MARKER: u8 = 0x01;

/// Fixed-length, byte-comparable key.
///
/// Ordering and equality are plain byte-wise comparison. Cloning is cheap
/// (reference counted).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EncodedKey(Bytes);

impl EncodedKey {
    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the key length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the zero-length key.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedKey({})", self)
    }
}

impl fmt::Display for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Stateless encoder between typed key values and [`EncodedKey`].
pub struct KeyEncoder;

impl KeyEncoder {
    /// Encodes `values` (one per key column, in key order) under `schema`.
    ///
    /// Fails with `KeyColumnCount` if the arity is wrong, `TypeMismatch` if a
    /// value's type or a column's declared width disagrees with the column,
    /// and `NullNotAllowed` for a NULL in a non-nullable column.
    pub fn encode(values: &[Value], schema: &Schema) -> Result<EncodedKey> {
        if values.len() != schema.column_count() {
            return Err(ArborError::KeyColumnCount {
                expected: schema.column_count(),
                actual: values.len(),
            });
        }

        let mut buf = BytesMut::with_capacity(schema.key_length());
        for (value, column) in values.iter().zip(schema.columns()) {
            Self::encode_column(&mut buf, value, column)?;
        }
        Ok(EncodedKey(buf.freeze()))
    }

    /// Decodes a key produced by [`KeyEncoder::encode`] under the same schema.
    pub fn decode(key: &EncodedKey, schema: &Schema) -> Result<Vec<Value>> {
        if key.len() != schema.key_length() {
            return Err(ArborError::KeyDecode(format!(
                "key is {} bytes, schema expects {}",
                key.len(),
                schema.key_length()
            )));
        }

        let bytes = key.as_bytes();
        let mut pos = 0;
        let mut values = Vec::with_capacity(schema.column_count());
        for column in schema.columns() {
            check_width(column)?;
            if column.nullable {
                let marker = bytes[pos];
                pos += 1;
                if marker == NULL_MARKER {
                    pos += column.length;
                    values.push(Value::Null);
                    continue;
                }
                if marker != PRESENT_MARKER {
                    return Err(ArborError::KeyDecode(format!(
                        "bad null indicator 0x{:02x} for column {}",
                        marker, column.name
                    )));
                }
            }
            let segment = &bytes[pos..pos + column.length];
            pos += column.length;
            values.push(Self::decode_segment(segment, column)?);
        }
        Ok(values)
    }

    /// Length of every key encoded under `schema`.
    #[inline]
    pub fn encoded_len(schema: &Schema) -> usize {
        schema.key_length()
    }

    fn encode_column(buf: &mut BytesMut, value: &Value, column: &Column) -> Result<()> {
        check_width(column)?;

        if value.is_null() {
            if !column.nullable {
                return Err(ArborError::NullNotAllowed {
                    column: column.name.clone(),
                });
            }
            buf.put_u8(NULL_MARKER);
            buf.put_bytes(0, column.length);
            return Ok(());
        }

        if value.type_id() != column.type_id {
            return Err(ArborError::TypeMismatch {
                expected: column.type_id.to_string(),
                actual: value.type_id().to_string(),
            });
        }

        if column.nullable {
            buf.put_u8(PRESENT_MARKER);
        }

        match value {
            Value::Boolean(b) => buf.put_u8(*b as u8),
            Value::Int8(v) => buf.put_u8((*v as u8) ^ 0x80),
            Value::Int16(v) => buf.put_u16((*v as u16) ^ 0x8000),
            Value::Int32(v) => buf.put_u32((*v as u32) ^ 0x8000_0000),
            Value::Int64(v) | Value::Timestamp(v) => {
                buf.put_u64((*v as u64) ^ 0x8000_0000_0000_0000)
            }
            Value::UInt8(v) => buf.put_u8(*v),
            Value::UInt16(v) => buf.put_u16(*v),
            Value::UInt32(v) => buf.put_u32(*v),
            Value::UInt64(v) => buf.put_u64(*v),
            Value::Null | Value::Varchar(_) => {
                return Err(ArborError::UnsupportedType(value.type_id().to_string()));
            }
        }
        Ok(())
    }

    fn decode_segment(segment: &[u8], column: &Column) -> Result<Value> {
        let value = match column.type_id {
            TypeId::Boolean => Value::Boolean(segment[0] != 0),
            TypeId::Int8 => Value::Int8((segment[0] ^ 0x80) as i8),
            TypeId::Int16 => Value::Int16((be_u16(segment) ^ 0x8000) as i16),
            TypeId::Int32 => Value::Int32((be_u32(segment) ^ 0x8000_0000) as i32),
            TypeId::Int64 => Value::Int64((be_u64(segment) ^ 0x8000_0000_0000_0000) as i64),
            TypeId::Timestamp => {
                Value::Timestamp((be_u64(segment) ^ 0x8000_0000_0000_0000) as i64)
            }
            TypeId::UInt8 => Value::UInt8(segment[0]),
            TypeId::UInt16 => Value::UInt16(be_u16(segment)),
            TypeId::UInt32 => Value::UInt32(be_u32(segment)),
            TypeId::UInt64 => Value::UInt64(be_u64(segment)),
            other => return Err(ArborError::UnsupportedType(other.to_string())),
        };
        Ok(value)
    }
}

/// Formats key values as `(v1, v2, ...)` for diagnostics.
pub fn format_key(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

/// Verifies that a key column is encodable and declares its type's natural width.
pub(crate) fn check_width(column: &Column) -> Result<()> {
    if !column.type_id.is_key_encodable() {
        return Err(ArborError::UnsupportedType(column.type_id.to_string()));
    }
    match column.type_id.fixed_size() {
        Some(size) if size == column.length => Ok(()),
        Some(size) => Err(ArborError::TypeMismatch {
            expected: format!("{} of {} bytes", column.type_id, size),
            actual: format!("column {} of {} bytes", column.name, column.length),
        }),
        None => Err(ArborError::UnsupportedType(column.type_id.to_string())),
    }
}

#[inline]
fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

#[inline]
fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[inline]
fn be_u64(b: &[u8]) -> u64 {
    u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn schema(types: &[TypeId]) -> Schema {
        let columns = types
            .iter()
            .enumerate()
            .map(|(i, t)| Column::new(*t, format!("c{}", i), false))
            .collect();
        Schema::new(columns)
    }

    fn encode(values: &[Value], schema: &Schema) -> EncodedKey {
        KeyEncoder::encode(values, schema).unwrap()
    }

    #[test]
    fn test_fixed_length() {
        let s = schema(&[TypeId::Int64, TypeId::Int32, TypeId::Int16, TypeId::Int8]);
        let key = encode(
            &[
                Value::Int64(1),
                Value::Int32(2),
                Value::Int16(3),
                Value::Int8(4),
            ],
            &s,
        );
        assert_eq!(key.len(), 15);
        assert_eq!(KeyEncoder::encoded_len(&s), 15);
    }

    #[test]
    fn test_sign_bias() {
        let s = schema(&[TypeId::Int32]);
        assert_eq!(encode(&[Value::Int32(0)], &s).as_bytes(), &[0x80, 0, 0, 0]);
        assert_eq!(
            encode(&[Value::Int32(-1)], &s).as_bytes(),
            &[0x7f, 0xff, 0xff, 0xff]
        );
        assert_eq!(
            encode(&[Value::Int32(i32::MIN)], &s).as_bytes(),
            &[0, 0, 0, 0]
        );
    }

    #[test]
    fn test_negative_values_sort_first() {
        let s = schema(&[TypeId::Int8]);
        let values: Vec<i8> = vec![i8::MIN, -100, -1, 0, 1, 93, i8::MAX];
        let keys: Vec<EncodedKey> = values
            .iter()
            .map(|v| encode(&[Value::Int8(*v)], &s))
            .collect();
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_order_preserving_random_composites() {
        let s = schema(&[TypeId::Int16, TypeId::Int64, TypeId::Int8]);
        let mut rng = rand::rng();

        for _ in 0..2000 {
            let a = (
                rng.random::<i16>(),
                rng.random_range(-3i64..3),
                rng.random::<i8>(),
            );
            let b = (
                rng.random::<i16>() % 4,
                rng.random_range(-3i64..3),
                rng.random::<i8>(),
            );
            let ka = encode(&[Value::Int16(a.0), Value::Int64(a.1), Value::Int8(a.2)], &s);
            let kb = encode(&[Value::Int16(b.0), Value::Int64(b.1), Value::Int8(b.2)], &s);
            assert_eq!(ka.cmp(&kb), a.cmp(&b), "a={:?} b={:?}", a, b);
        }
    }

    #[test]
    fn test_unsigned_and_bool_order() {
        let s = schema(&[TypeId::Boolean, TypeId::UInt16]);
        let k1 = encode(&[Value::Boolean(false), Value::UInt16(u16::MAX)], &s);
        let k2 = encode(&[Value::Boolean(true), Value::UInt16(0)], &s);
        assert!(k1 < k2);
    }

    #[test]
    fn test_nullable_column_orders_null_first() {
        let s = Schema::new(vec![Column::new(TypeId::Int16, "A", true)]);
        let null = encode(&[Value::Null], &s);
        let min = encode(&[Value::Int16(i16::MIN)], &s);
        assert_eq!(null.len(), 3);
        assert_eq!(min.len(), 3);
        assert!(null < min);
    }

    #[test]
    fn test_null_in_non_nullable_column() {
        let s = schema(&[TypeId::Int32]);
        let err = KeyEncoder::encode(&[Value::Null], &s).unwrap_err();
        assert!(matches!(err, ArborError::NullNotAllowed { ref column } if column == "c0"));
    }

    #[test]
    fn test_type_mismatch() {
        let s = schema(&[TypeId::Int32]);
        let err = KeyEncoder::encode(&[Value::Int64(1)], &s).unwrap_err();
        assert_eq!(err.to_string(), "Type mismatch: expected INT32, got INT64");

        let err = KeyEncoder::encode(&[Value::from("x")], &s).unwrap_err();
        assert!(matches!(err, ArborError::TypeMismatch { .. }));
    }

    #[test]
    fn test_width_mismatch() {
        let s = Schema::new(vec![Column::with_length(TypeId::Int32, 8, "A", false)]);
        let err = KeyEncoder::encode(&[Value::Int32(1)], &s).unwrap_err();
        assert!(matches!(err, ArborError::TypeMismatch { .. }));
    }

    #[test]
    fn test_arity_mismatch() {
        let s = schema(&[TypeId::Int32, TypeId::Int32]);
        let err = KeyEncoder::encode(&[Value::Int32(1)], &s).unwrap_err();
        assert!(matches!(
            err,
            ArborError::KeyColumnCount {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_unsupported_column_type() {
        let s = Schema::new(vec![Column::new(TypeId::Varchar, "name", false)]);
        let err = KeyEncoder::encode(&[Value::from("x")], &s).unwrap_err();
        assert!(matches!(err, ArborError::UnsupportedType(_)));
    }

    #[test]
    fn test_decode_inverts_encode() {
        let s = Schema::new(vec![
            Column::new(TypeId::Int8, "a", false),
            Column::new(TypeId::Int64, "b", true),
            Column::new(TypeId::UInt32, "c", false),
            Column::new(TypeId::Timestamp, "d", true),
            Column::new(TypeId::Boolean, "e", false),
        ]);
        let values = vec![
            Value::Int8(-7),
            Value::Null,
            Value::UInt32(4_000_000_000),
            Value::Timestamp(-1_000),
            Value::Boolean(true),
        ];
        let key = encode(&values, &s);
        assert_eq!(KeyEncoder::decode(&key, &s).unwrap(), values);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let s = schema(&[TypeId::Int32]);
        let key = EncodedKey::from_bytes(vec![0u8; 3]);
        assert!(matches!(
            KeyEncoder::decode(&key, &s),
            Err(ArborError::KeyDecode(_))
        ));
    }

    #[test]
    fn test_display_hex() {
        let s = schema(&[TypeId::Int16]);
        let key = encode(&[Value::Int16(1)], &s);
        assert_eq!(key.to_string(), "8001");
    }

    #[test]
    fn test_format_key() {
        assert_eq!(
            format_key(&[Value::Int32(1), Value::Null]),
            "(1, NULL)".to_string()
        );
    }
}
