//! Structural equality (spec §4.6): descriptors must agree, every field's
//! presence and value must agree, and unknown-field bytes must agree
//! per-number (order across numbers is immaterial).

use crate::error::WireError;
use crate::message::{DynamicMessage, FieldStorage};
use crate::value::Value;

/// `true` iff `a` and `b` are structurally equal under the rules of §4.6.
/// Fatal if the two messages carry descriptors for different message types.
pub fn equal(a: &DynamicMessage, b: &DynamicMessage) -> Result<bool, WireError> {
    if a.descriptor().full_name != b.descriptor().full_name {
        return Err(WireError::DescriptorMismatch);
    }

    for field in &a.descriptor().fields {
        let has_a = a.has(field.number);
        let has_b = b.has(field.number);
        if has_a != has_b {
            return Ok(false);
        }
        if !has_a {
            continue;
        }
        let storage_a = a.get(field.number).expect("has() just confirmed presence");
        let storage_b = b.get(field.number).expect("has() just confirmed presence");
        if !storage_equal(storage_a, storage_b)? {
            return Ok(false);
        }
    }

    Ok(a.unknown_fields() == b.unknown_fields())
}

fn storage_equal(a: &FieldStorage, b: &FieldStorage) -> Result<bool, WireError> {
    match (a, b) {
        (FieldStorage::Singular(va), FieldStorage::Singular(vb)) => value_equal(va, vb),
        (FieldStorage::Repeated(va), FieldStorage::Repeated(vb)) => {
            if va.len() != vb.len() {
                return Ok(false);
            }
            for (x, y) in va.iter().zip(vb.iter()) {
                if !value_equal(x, y)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (FieldStorage::Map(ma), FieldStorage::Map(mb)) => {
            if ma.len() != mb.len() {
                return Ok(false);
            }
            for (key, va) in ma {
                let Some(vb) = mb.get(key) else {
                    return Ok(false);
                };
                if !value_equal(va, vb)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn value_equal(a: &Value, b: &Value) -> Result<bool, WireError> {
    Ok(match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::I32(x), Value::I32(y)) => x == y,
        (Value::I64(x), Value::I64(y)) => x == y,
        (Value::U32(x), Value::U32(y)) => x == y,
        (Value::U64(x), Value::U64(y)) => x == y,
        // NaN is never equal to itself, matching the spec's "floats inequal on NaN".
        (Value::F32(x), Value::F32(y)) => x == y,
        (Value::F64(x), Value::F64(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Enum(x), Value::Enum(y)) => x == y,
        (Value::Message(x), Value::Message(y)) => equal(x, y)?,
        _ => false,
    })
}
