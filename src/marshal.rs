//! Serializes a [`DynamicMessage`] to wire bytes (spec §4.3).
//!
//! Field emission walks the descriptor rather than the wire: every populated
//! known field is visited once, in declaration order (or ascending field
//! number, in deterministic mode), followed by extensions and finally the
//! preserved unknown-field bytes.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::descriptor::{FieldDescriptor, Kind, MessageDescriptor};
use crate::error::{NonFatal, PathError, WireError};
use crate::extension::{self, ExtensionValue};
use crate::field_table::{encode_scalar, field_table_for};
use crate::message::{DynamicMessage, FieldStorage};
use crate::ops;
use crate::value::{MapKey, Value};
use crate::wire::{self, WireType};

/// Configuration for [`marshal`]/[`marshal_append`] (spec §4.3).
#[derive(Clone, Copy, Debug, Default)]
pub struct MarshalOptions {
    /// Skip the `IsInitialized` check (and its `RequiredNotSet` report).
    pub allow_partial: bool,
    /// Ascending field number / sorted map keys, for byte-stable output.
    pub deterministic: bool,
    /// Trust a previously computed size rather than recomputing it before
    /// reserving buffer capacity. This implementation has no place to cache
    /// a size on [`DynamicMessage`], so the flag only affects whether the
    /// initial capacity is pre-sized; correctness never depends on it.
    pub use_cached_size: bool,
}

/// Serializes `msg` to a freshly allocated buffer.
pub fn marshal(
    msg: &DynamicMessage,
    options: &MarshalOptions,
) -> Result<(Bytes, Option<NonFatal>), PathError> {
    let mut buf = if options.use_cached_size {
        BytesMut::new()
    } else {
        BytesMut::with_capacity(crate::size::size(msg, options))
    };
    let non_fatal = marshal_append(&mut buf, msg, options)?;
    Ok((buf.freeze(), non_fatal))
}

/// Serializes `msg`, appending to `buf`. `buf` holds the complete output
/// even when `Ok(Some(_))` reports a non-fatal `RequiredNotSet` condition;
/// only a fatal error may leave `buf` partially written.
pub fn marshal_append(
    buf: &mut BytesMut,
    msg: &DynamicMessage,
    options: &MarshalOptions,
) -> Result<Option<NonFatal>, PathError> {
    marshal_fields(buf, msg, options)?;
    if !options.allow_partial {
        if let Some(path) = ops::initialized::is_initialized(msg) {
            return Ok(Some(NonFatal::RequiredNotSet(path)));
        }
    }
    Ok(None)
}

/// Writes a message's body (no outer tag) — the set of known fields,
/// extensions, and unknown-field bytes, in that order. Shared with
/// [`crate::extension`] for encoding message-kind extension values, and
/// with submessage/group recursion below.
pub(crate) fn marshal_fields(
    buf: &mut BytesMut,
    msg: &DynamicMessage,
    options: &MarshalOptions,
) -> Result<(), PathError> {
    let table = field_table_for(msg.descriptor());
    let numbers: Vec<u32> = if options.deterministic {
        table.sorted_numbers().to_vec()
    } else {
        msg.descriptor().fields.iter().map(|f| f.number).collect()
    };

    for number in numbers {
        if !msg.has(number) {
            continue;
        }
        let field = table
            .lookup(number)
            .expect("number came from this table's own field list");
        let storage = msg.get(number).expect("has() just confirmed presence");
        encode_field(buf, field, storage, options).map_err(|e| e.with_field(number))?;
    }

    encode_extensions(buf, msg, options)?;

    for (_, record) in msg.unknown_fields().iter() {
        buf.extend_from_slice(record);
    }

    Ok(())
}

fn encode_field(
    buf: &mut BytesMut,
    field: &FieldDescriptor,
    storage: &FieldStorage,
    options: &MarshalOptions,
) -> Result<(), PathError> {
    match storage {
        FieldStorage::Singular(value) => encode_element(buf, field, value, options),
        FieldStorage::Repeated(values) => {
            if field.packed && field.kind.is_packable() {
                encode_packed(buf, field, values);
                Ok(())
            } else {
                for (index, value) in values.iter().enumerate() {
                    encode_element(buf, field, value, options)
                        .map_err(|e| e.with_index(index))?;
                }
                Ok(())
            }
        }
        FieldStorage::Map(entries) => encode_map(buf, field, entries, options),
    }
}

fn encode_element(
    buf: &mut BytesMut,
    field: &FieldDescriptor,
    value: &Value,
    options: &MarshalOptions,
) -> Result<(), PathError> {
    match field.kind {
        Kind::Message => {
            let sub = value.as_message().expect("message field holds a Value::Message");
            wire::append_tag(buf, field.number, WireType::Len);
            write_len_delimited(buf, |buf| marshal_fields(buf, sub, options))?;
            Ok(())
        }
        Kind::Group => {
            let sub = value.as_message().expect("group field holds a Value::Message");
            wire::append_tag(buf, field.number, WireType::SGroup);
            marshal_fields(buf, sub, options)?;
            wire::append_tag(buf, field.number, WireType::EGroup);
            Ok(())
        }
        kind => {
            wire::append_tag(buf, field.number, kind.unpacked_wire_type());
            encode_scalar(buf, kind, value);
            Ok(())
        }
    }
}

fn encode_packed(buf: &mut BytesMut, field: &FieldDescriptor, values: &[Value]) {
    wire::append_tag(buf, field.number, WireType::Len);
    let len_pos = buf.len();
    buf.extend_from_slice(&[0]);
    let body_start = buf.len();
    for value in values {
        encode_scalar(buf, field.kind, value);
    }
    finish_len_delimited(buf, len_pos, body_start);
}

fn encode_map(
    buf: &mut BytesMut,
    field: &FieldDescriptor,
    entries: &std::collections::HashMap<MapKey, Value>,
    options: &MarshalOptions,
) -> Result<(), PathError> {
    let entry_descriptor = field
        .message_type
        .clone()
        .expect("map field carries a synthesized map-entry message_type");
    let key_field = entry_descriptor
        .field_by_number(1)
        .expect("map entry always has a key field");
    let value_field = entry_descriptor
        .field_by_number(2)
        .expect("map entry always has a value field");

    let mut pairs: Vec<(&MapKey, &Value)> = entries.iter().collect();
    if options.deterministic {
        pairs.sort_by(|a, b| a.0.sort_key().partial_cmp(&b.0.sort_key()).unwrap());
    }

    for (key, value) in pairs {
        wire::append_tag(buf, field.number, WireType::Len);
        let len_pos = buf.len();
        buf.extend_from_slice(&[0]);
        let body_start = buf.len();
        if !key.is_default() {
            let key_value = key.to_value();
            wire::append_tag(buf, key_field.number, key_field.kind.unpacked_wire_type());
            encode_scalar(buf, key_field.kind, &key_value);
        }
        if !value.is_default(value_field.kind) {
            encode_element(buf, value_field, value, options)
                .map_err(|e| e.with_key(key.debug_string()))?;
        }
        finish_len_delimited(buf, len_pos, body_start);
    }
    Ok(())
}

fn encode_extensions(
    buf: &mut BytesMut,
    msg: &DynamicMessage,
    options: &MarshalOptions,
) -> Result<(), PathError> {
    let mut fields: Vec<(u32, &crate::extension::ExtensionField)> =
        msg.extensions().iter().collect();
    if options.deterministic {
        fields.sort_by_key(|(number, _)| *number);
    }
    for (number, field) in fields {
        let Some(descriptor) = &field.descriptor else {
            if let ExtensionValue::Raw(raw) = &field.value {
                buf.extend_from_slice(raw);
            }
            continue;
        };
        if matches!(descriptor.kind, Kind::Message | Kind::Group) {
            encode_message_extension(buf, descriptor, &field.value, options)
                .map_err(|e| e.with_field(number))?;
        } else {
            extension::encode_extension(buf, field).map_err(|e| PathError::new(e).with_field(number))?;
        }
    }
    Ok(())
}

fn encode_message_extension(
    buf: &mut BytesMut,
    descriptor: &Arc<FieldDescriptor>,
    value: &ExtensionValue,
    options: &MarshalOptions,
) -> Result<(), PathError> {
    match value {
        ExtensionValue::Raw(raw) => {
            buf.extend_from_slice(raw);
            Ok(())
        }
        ExtensionValue::Decoded(v) => encode_element(buf, descriptor, v, options),
        ExtensionValue::DecodedRepeated(values) => {
            for (index, v) in values.iter().enumerate() {
                encode_element(buf, descriptor, v, options).map_err(|e| e.with_index(index))?;
            }
            Ok(())
        }
    }
}

/// Speculative length-prefix encoding (spec §4.3.1): reserve a one-byte
/// placeholder, write the body, then fix the prefix up in place (or shift
/// the body right) if the real length needed more than one varint byte.
pub(crate) fn write_len_delimited<F>(buf: &mut BytesMut, write_body: F) -> Result<(), PathError>
where
    F: FnOnce(&mut BytesMut) -> Result<(), PathError>,
{
    let len_pos = buf.len();
    buf.extend_from_slice(&[0]);
    let body_start = buf.len();
    write_body(buf)?;
    finish_len_delimited(buf, len_pos, body_start);
    Ok(())
}

fn finish_len_delimited(buf: &mut BytesMut, len_pos: usize, body_start: usize) {
    let body_len = buf.len() - body_start;
    let msiz = wire::size_varint(body_len as u64);
    if msiz == 1 {
        buf[len_pos] = body_len as u8;
        return;
    }
    let shift = msiz - 1;
    buf.resize(buf.len() + shift, 0);
    buf.copy_within(body_start..body_start + body_len, body_start + shift);
    let mut len_bytes = BytesMut::new();
    wire::append_varint(&mut len_bytes, body_len as u64);
    buf[len_pos..len_pos + msiz].copy_from_slice(&len_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Cardinality, Syntax};

    fn scalar_field(number: u32, name: &str, kind: Kind, cardinality: Cardinality) -> FieldDescriptor {
        FieldDescriptor {
            number,
            name: name.into(),
            json_name: name.into(),
            kind,
            cardinality,
            packed: false,
            enum_type: None,
            message_type: None,
            map_entry: false,
            oneof_index: None,
            extension: false,
            extendee: None,
            syntax: Syntax::Proto3,
        }
    }

    #[test]
    fn basic_scalar_matches_spec_example() {
        let descriptor = Arc::new(MessageDescriptor::new(
            "test.Basic",
            vec![scalar_field(1, "x", Kind::Int32, Cardinality::SingularProto3)],
            Vec::new(),
            Vec::new(),
            false,
            Syntax::Proto3,
        ));
        let mut msg = DynamicMessage::new(descriptor.clone());
        let field = descriptor.field_by_number(1).unwrap().clone();
        msg.set_singular(&field, Value::I32(150));

        let (bytes, non_fatal) = marshal(&msg, &MarshalOptions::default()).unwrap();
        assert!(non_fatal.is_none());
        assert_eq!(&bytes[..], &[0x08, 0x96, 0x01]);
    }

    #[test]
    fn packed_repeated_matches_spec_example() {
        let mut field = scalar_field(4, "ns", Kind::Int32, Cardinality::Repeated);
        field.packed = true;
        let descriptor = Arc::new(MessageDescriptor::new(
            "test.Packed",
            vec![field.clone()],
            Vec::new(),
            Vec::new(),
            false,
            Syntax::Proto3,
        ));
        let mut msg = DynamicMessage::new(descriptor);
        msg.mutable_repeated(4).extend([
            Value::I32(3),
            Value::I32(270),
            Value::I32(86942),
        ]);

        let (bytes, _) = marshal(&msg, &MarshalOptions::default()).unwrap();
        assert_eq!(
            &bytes[..],
            &[0x22, 0x06, 0x03, 0x8E, 0x02, 0x9E, 0xA7, 0x05]
        );
    }

    #[test]
    fn deterministic_mode_orders_fields_by_number() {
        let descriptor = Arc::new(MessageDescriptor::new(
            "test.Ordered",
            vec![
                scalar_field(5, "b", Kind::Int32, Cardinality::SingularProto3),
                scalar_field(1, "a", Kind::Int32, Cardinality::SingularProto3),
            ],
            Vec::new(),
            Vec::new(),
            false,
            Syntax::Proto3,
        ));
        let mut msg = DynamicMessage::new(descriptor.clone());
        msg.set_singular(&descriptor.field_by_number(5).unwrap().clone(), Value::I32(2));
        msg.set_singular(&descriptor.field_by_number(1).unwrap().clone(), Value::I32(1));

        let options = MarshalOptions {
            deterministic: true,
            ..Default::default()
        };
        let (bytes, _) = marshal(&msg, &options).unwrap();
        // field 1 (tag 0x08) before field 5 (tag 0x28), regardless of set order.
        assert_eq!(&bytes[..], &[0x08, 0x01, 0x28, 0x02]);
    }
}
