//! Computes the exact marshaled byte length of a message without producing
//! any bytes (spec §4.3.2). Mirrors [`crate::marshal`]'s field dispatch
//! field by field, so invariant 6 (`size(m) == len(marshal(m))`) holds by
//! construction rather than by coincidence.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::{FieldDescriptor, Kind};
use crate::extension::ExtensionValue;
use crate::field_table::size_scalar;
use crate::marshal::MarshalOptions;
use crate::message::{DynamicMessage, FieldStorage};
use crate::value::{MapKey, Value};
use crate::wire;

/// Exact length `marshal(msg, options)` would produce.
pub fn size(msg: &DynamicMessage, options: &MarshalOptions) -> usize {
    size_fields(msg, options)
}

pub(crate) fn size_fields(msg: &DynamicMessage, options: &MarshalOptions) -> usize {
    let mut total = 0usize;

    for field in &msg.descriptor().fields {
        if !msg.has(field.number) {
            continue;
        }
        let storage = msg.get(field.number).expect("has() just confirmed presence");
        total += size_field(field, storage, options);
    }

    total += size_extensions(msg, options);

    for (_, record) in msg.unknown_fields().iter() {
        total += record.len();
    }

    total
}

fn size_field(field: &FieldDescriptor, storage: &FieldStorage, options: &MarshalOptions) -> usize {
    match storage {
        FieldStorage::Singular(value) => size_element(field, value, options),
        FieldStorage::Repeated(values) => {
            if field.packed && field.kind.is_packable() {
                let body: usize = values.iter().map(|v| size_scalar(field.kind, v)).sum();
                wire::size_tag(field.number) + wire::size_varint(body as u64) + body
            } else {
                values.iter().map(|v| size_element(field, v, options)).sum()
            }
        }
        FieldStorage::Map(entries) => size_map(field, entries, options),
    }
}

fn size_element(field: &FieldDescriptor, value: &Value, options: &MarshalOptions) -> usize {
    match field.kind {
        Kind::Message => {
            let sub = value.as_message().expect("message field holds a Value::Message");
            let body = size_fields(sub, options);
            wire::size_tag(field.number) + wire::size_varint(body as u64) + body
        }
        Kind::Group => {
            let sub = value.as_message().expect("group field holds a Value::Message");
            2 * wire::size_tag(field.number) + size_fields(sub, options)
        }
        kind => wire::size_tag(field.number) + size_scalar(kind, value),
    }
}

fn size_map(
    field: &FieldDescriptor,
    entries: &HashMap<MapKey, Value>,
    options: &MarshalOptions,
) -> usize {
    let entry_descriptor = field
        .message_type
        .as_ref()
        .expect("map field carries a synthesized map-entry message_type");
    let key_field = entry_descriptor
        .field_by_number(1)
        .expect("map entry always has a key field");
    let value_field = entry_descriptor
        .field_by_number(2)
        .expect("map entry always has a value field");

    entries
        .iter()
        .map(|(key, value)| {
            let mut body = 0usize;
            if !key.is_default() {
                body += wire::size_tag(key_field.number) + size_scalar(key_field.kind, &key.to_value());
            }
            if !value.is_default(value_field.kind) {
                body += size_element(value_field, value, options);
            }
            wire::size_tag(field.number) + wire::size_varint(body as u64) + body
        })
        .sum()
}

fn size_extensions(msg: &DynamicMessage, options: &MarshalOptions) -> usize {
    msg.extensions()
        .iter()
        .map(|(_, field)| {
            let Some(descriptor) = &field.descriptor else {
                return match &field.value {
                    ExtensionValue::Raw(raw) => raw.len(),
                    _ => 0,
                };
            };
            if matches!(descriptor.kind, Kind::Message | Kind::Group) {
                size_message_extension(descriptor, &field.value, options)
            } else {
                crate::extension::size_extension(field)
            }
        })
        .sum()
}

fn size_message_extension(
    descriptor: &Arc<FieldDescriptor>,
    value: &ExtensionValue,
    options: &MarshalOptions,
) -> usize {
    match value {
        ExtensionValue::Raw(raw) => raw.len(),
        ExtensionValue::Decoded(v) => size_element(descriptor, v, options),
        ExtensionValue::DecodedRepeated(values) => {
            values.iter().map(|v| size_element(descriptor, v, options)).sum()
        }
    }
}
