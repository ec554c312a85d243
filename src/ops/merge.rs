//! Merge `src` into `dst` (spec §4.9): populated scalars replace, singular
//! messages recursively merge (or deep-clone if `dst` has none), repeated
//! fields append, maps insert/replace per key, and unknown bytes append.

use std::collections::HashMap;

use crate::error::WireError;
use crate::extension::ExtensionValue;
use crate::message::{DynamicMessage, FieldStorage};
use crate::ops::clone::clone_message;
use crate::value::Value;

/// Merges `src` into `dst`. Requires identical descriptors.
pub fn merge(dst: &mut DynamicMessage, src: &DynamicMessage) -> Result<(), WireError> {
    if dst.descriptor().full_name != src.descriptor().full_name {
        return Err(WireError::DescriptorMismatch);
    }

    for field in &src.descriptor().fields {
        let Some(src_storage) = src.get(field.number) else {
            continue;
        };
        match src_storage {
            FieldStorage::Singular(Value::Message(src_sub)) => {
                let dst_sub = dst.mutable_message(field);
                merge(dst_sub, src_sub)?;
            }
            FieldStorage::Singular(v) => dst.set_singular(field, v.clone()),
            FieldStorage::Repeated(values) => {
                dst.mutable_repeated(field.number)
                    .extend(values.iter().map(clone_field_value));
            }
            FieldStorage::Map(entries) => {
                let dst_map = dst.mutable_map(field.number);
                for (key, value) in entries {
                    merge_map_value(dst_map, key, value);
                }
            }
        }
    }

    merge_extensions(dst, src);
    dst.unknown_fields_mut().merge_from(src.unknown_fields());
    Ok(())
}

fn clone_field_value(value: &Value) -> Value {
    match value {
        Value::Message(m) => Value::Message(Box::new(clone_message(m))),
        other => other.clone(),
    }
}

fn merge_map_value(
    dst_map: &mut HashMap<crate::value::MapKey, Value>,
    key: &crate::value::MapKey,
    value: &Value,
) {
    match value {
        Value::Message(src_sub) => {
            if let Some(Value::Message(dst_sub)) = dst_map.get_mut(key) {
                // `merge` requires identical descriptors, which holds here
                // because both sides came from the same map-entry descriptor.
                merge(dst_sub, src_sub).expect("map value descriptors always match within one map field");
            } else {
                dst_map.insert(key.clone(), Value::Message(Box::new(clone_message(src_sub))));
            }
        }
        other => {
            dst_map.insert(key.clone(), other.clone());
        }
    }
}

/// Merges `src`'s extension table into `dst`: raw bytes are concatenated per
/// number, decoded repeated values append, decoded singular values replace.
pub fn merge_extensions(dst: &mut DynamicMessage, src: &DynamicMessage) {
    for (number, field) in src.extensions().iter() {
        match &field.value {
            ExtensionValue::Raw(raw) => dst.extensions_mut().append_raw(number, field.descriptor.clone(), raw),
            ExtensionValue::Decoded(v) => {
                if let Some(descriptor) = field.descriptor.clone() {
                    dst.extensions_mut().append_decoded(descriptor, v.clone());
                }
            }
            ExtensionValue::DecodedRepeated(values) => {
                if let Some(descriptor) = field.descriptor.clone() {
                    for v in values {
                        dst.extensions_mut().append_decoded(descriptor.clone(), v.clone());
                    }
                }
            }
        }
    }
}
