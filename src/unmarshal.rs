//! Parses a wire byte stream into a [`DynamicMessage`] (spec §4.4).
//!
//! The dispatch loop reads one tag at a time and routes it to a known
//! field, an extension (via the caller's [`ExtensionResolver`]), or the
//! unknown-field store, recursing for submessages and groups.

use std::sync::Arc;

use crate::descriptor::{FieldDescriptor, Kind};
use crate::error::{NonFatal, NonFatalSink, PathError, WireError};
use crate::field_table::{classify_wire, decode_scalar, field_table_for, WireMatch};
use crate::message::{DynamicMessage, FieldStorage};
use crate::value::{MapKey, Value};
use crate::wire::{self, WireType, DEFAULT_RECURSION_LIMIT};

/// Resolves an extension field by `(extendee_full_name, field_number)`; a
/// `None` return treats the field number as unknown (spec §4.5).
pub trait ExtensionResolver: Send + Sync {
    fn find_by_number(&self, extendee_full_name: &str, field_number: u32) -> Option<Arc<FieldDescriptor>>;
}

/// Configuration for [`unmarshal`] (spec §4.4).
#[derive(Clone, Default)]
pub struct UnmarshalOptions {
    /// Skip the post-parse `IsInitialized` check.
    pub allow_partial: bool,
    /// Drop unrecognized fields instead of preserving their raw bytes.
    pub discard_unknown: bool,
    /// Maximum submessage/group nesting depth; `0` means "use the default".
    pub recursion_limit: u32,
    pub resolver: Option<Arc<dyn ExtensionResolver>>,
}

impl UnmarshalOptions {
    fn effective_recursion_limit(&self) -> u32 {
        if self.recursion_limit == 0 {
            DEFAULT_RECURSION_LIMIT
        } else {
            self.recursion_limit
        }
    }
}

/// Parses `buf` into `msg`, merging into whatever `msg` already holds.
/// `msg`'s descriptor determines the field layout; callers unmarshal into a
/// fresh [`DynamicMessage::new`] for a clean decode.
pub fn unmarshal(buf: &[u8], msg: &mut DynamicMessage, options: &UnmarshalOptions) -> Result<Option<NonFatal>, PathError> {
    let mut sink = NonFatalSink::new();
    // The top-level message itself counts as depth 1, so that a nesting
    // depth of `recursion_limit - 1` succeeds and `recursion_limit` fails
    // (spec §8 boundary behavior), rather than off by one either way.
    run_loop(buf, msg, options, 1, &mut sink, None)?;
    if !options.allow_partial {
        if let Some(path) = crate::ops::initialized::is_initialized(msg) {
            tracing::debug!(path = %path, "required field not set after unmarshal");
            sink.report(NonFatal::RequiredNotSet(path));
        }
    }
    Ok(sink.into_result().err())
}

/// Consumes `buf` as a flat sequence of tag+record pairs, dispatching each
/// into `msg`. When `stop_at_group` is `Some(n)`, an `EGROUP` tag carrying
/// field number `n` ends the loop successfully; any other `EGROUP`, or
/// running out of bytes while still expecting one, is `GroupMismatch`.
/// Returns the number of bytes consumed (the whole of `buf` when
/// `stop_at_group` is `None`).
pub(crate) fn run_loop(
    buf: &[u8],
    msg: &mut DynamicMessage,
    options: &UnmarshalOptions,
    depth: u32,
    sink: &mut NonFatalSink,
    stop_at_group: Option<u32>,
) -> Result<usize, PathError> {
    let mut pos = 0;
    loop {
        if pos >= buf.len() {
            return match stop_at_group {
                Some(_) => Err(PathError::new(WireError::GroupMismatch)),
                None => Ok(pos),
            };
        }
        let record_start = pos;
        let ((number, wire_type), tag_n) =
            wire::consume_tag(&buf[pos..]).map_err(PathError::new)?;
        pos += tag_n;

        if wire_type == WireType::EGroup {
            return match stop_at_group {
                Some(expected) if expected == number => Ok(pos),
                _ => Err(PathError::new(WireError::GroupMismatch)),
            };
        }

        let consumed = dispatch_record(buf, pos, record_start, number, wire_type, msg, options, depth, sink)
            .map_err(|e| e.with_field(number))?;
        pos = consumed;
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_record(
    buf: &[u8],
    pos: usize,
    record_start: usize,
    number: u32,
    wire_type: WireType,
    msg: &mut DynamicMessage,
    options: &UnmarshalOptions,
    depth: u32,
    sink: &mut NonFatalSink,
) -> Result<usize, PathError> {
    let table = field_table_for(msg.descriptor());
    if let Some(field) = table.lookup(number) {
        let classify = classify_wire(field, wire_type);
        if classify != WireMatch::Mismatch {
            let packed = classify == WireMatch::Packed;
            if packed || !is_unrecognized_closed_enum(field, buf, pos) {
                let n = decode_known_field(buf, pos, field, wire_type, packed, msg, options, depth, sink)?;
                return Ok(n);
            }
            tracing::trace!(field = %field.name, "closed enum value unrecognized, treating as unknown");
        }
    } else if msg.descriptor().is_extension_number(number) {
        let resolved = options
            .resolver
            .as_ref()
            .and_then(|r| r.find_by_number(&msg.descriptor().full_name, number));
        match resolved {
            Some(field) => {
                let classify = classify_wire(&field, wire_type);
                if classify != WireMatch::Mismatch {
                    let n = decode_extension(buf, pos, &field, wire_type, classify == WireMatch::Packed, msg, options, depth, sink)?;
                    return Ok(n);
                }
            }
            None => {
                tracing::trace!(extendee = %msg.descriptor().full_name, field = number, "extension not resolved, treating as unknown");
            }
        }
    }

    let budget = options.effective_recursion_limit().saturating_sub(depth);
    let (_, _, total_n) = wire::consume_field(&buf[record_start..], budget).map_err(PathError::new)?;
    if !options.discard_unknown {
        msg.unknown_fields_mut().push(number, &buf[record_start..record_start + total_n]);
    }
    Ok(record_start + total_n)
}

/// A closed (proto2) enum rejects numbers its descriptor doesn't list,
/// falling back to unknown-field bytes rather than an `Enum` value (spec
/// §4.4's enum Open Question, resolved per SPEC_FULL.md §4). Open (proto3)
/// enums always accept the raw number.
fn is_unrecognized_closed_enum(field: &FieldDescriptor, buf: &[u8], pos: usize) -> bool {
    if field.kind != Kind::Enum {
        return false;
    }
    let Some(enum_type) = &field.enum_type else {
        return false;
    };
    if !enum_type.closed {
        return false;
    }
    match wire::consume_varint(&buf[pos..]) {
        Ok((v, _)) => !enum_type.is_known(v as i32),
        Err(_) => false,
    }
}

fn is_map_field(field: &FieldDescriptor) -> bool {
    field
        .message_type
        .as_ref()
        .map(|m| m.is_map_entry)
        .unwrap_or(false)
}

fn check_recursion(depth: u32, options: &UnmarshalOptions) -> Result<(), PathError> {
    if depth >= options.effective_recursion_limit() {
        Err(PathError::new(WireError::RecursionLimit))
    } else {
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_known_field(
    buf: &[u8],
    pos: usize,
    field: &FieldDescriptor,
    wire_type: WireType,
    packed: bool,
    msg: &mut DynamicMessage,
    options: &UnmarshalOptions,
    depth: u32,
    sink: &mut NonFatalSink,
) -> Result<usize, PathError> {
    match field.kind {
        Kind::Message if is_map_field(field) => decode_map_entry(buf, pos, field, msg, options, depth, sink),
        Kind::Message => decode_message_field(buf, pos, field, msg, options, depth, sink),
        Kind::Group => decode_group_field(buf, pos, field, wire_type, msg, options, depth, sink),
        kind if packed => decode_packed_scalar(buf, pos, field, kind, msg),
        _ => decode_scalar_field(buf, pos, field, wire_type, msg, sink),
    }
}

fn decode_scalar_field(
    buf: &[u8],
    pos: usize,
    field: &FieldDescriptor,
    wire_type: WireType,
    msg: &mut DynamicMessage,
    sink: &mut NonFatalSink,
) -> Result<usize, PathError> {
    let (value, n, utf8_ok) = decode_scalar(field.kind, wire_type, &buf[pos..]).map_err(PathError::new)?;
    if !utf8_ok {
        tracing::debug!(field = %field.name, "invalid UTF-8 in string field");
        sink.report(NonFatal::InvalidUtf8(field.name.clone()));
    }
    if field.is_repeated() {
        msg.mutable_repeated(field.number).push(value);
    } else {
        msg.set_singular(field, value);
    }
    Ok(pos + n)
}

fn decode_packed_scalar(
    buf: &[u8],
    pos: usize,
    field: &FieldDescriptor,
    kind: Kind,
    msg: &mut DynamicMessage,
) -> Result<usize, PathError> {
    let (payload, n) = wire::consume_bytes(&buf[pos..]).map_err(PathError::new)?;
    let mut consumed = 0;
    let list = msg.mutable_repeated(field.number);
    while consumed < payload.len() {
        let (value, vn, _) = decode_scalar(kind, kind.unpacked_wire_type(), &payload[consumed..])
            .map_err(PathError::new)?;
        consumed += vn;
        list.push(value);
    }
    Ok(pos + n)
}

fn decode_message_field(
    buf: &[u8],
    pos: usize,
    field: &FieldDescriptor,
    msg: &mut DynamicMessage,
    options: &UnmarshalOptions,
    depth: u32,
    sink: &mut NonFatalSink,
) -> Result<usize, PathError> {
    let (payload, n) = wire::consume_bytes(&buf[pos..]).map_err(PathError::new)?;
    check_recursion(depth, options)?;
    if field.is_repeated() {
        let sub_descriptor = field
            .message_type
            .clone()
            .expect("message field carries a message_type");
        let mut sub = DynamicMessage::new(sub_descriptor);
        run_loop(payload, &mut sub, options, depth + 1, sink, None)?;
        msg.mutable_repeated(field.number).push(Value::Message(Box::new(sub)));
    } else {
        let sub = msg.mutable_message(field);
        run_loop(payload, sub, options, depth + 1, sink, None)?;
    }
    Ok(pos + n)
}

#[allow(clippy::too_many_arguments)]
fn decode_group_field(
    buf: &[u8],
    pos: usize,
    field: &FieldDescriptor,
    _wire_type: WireType,
    msg: &mut DynamicMessage,
    options: &UnmarshalOptions,
    depth: u32,
    sink: &mut NonFatalSink,
) -> Result<usize, PathError> {
    check_recursion(depth, options)?;
    if field.is_repeated() {
        let sub_descriptor = field
            .message_type
            .clone()
            .expect("group field carries a message_type");
        let mut sub = DynamicMessage::new(sub_descriptor);
        let n = run_loop(&buf[pos..], &mut sub, options, depth + 1, sink, Some(field.number))?;
        msg.mutable_repeated(field.number).push(Value::Message(Box::new(sub)));
        Ok(pos + n)
    } else {
        let sub = msg.mutable_message(field);
        let n = run_loop(&buf[pos..], sub, options, depth + 1, sink, Some(field.number))?;
        Ok(pos + n)
    }
}

fn decode_map_entry(
    buf: &[u8],
    pos: usize,
    field: &FieldDescriptor,
    msg: &mut DynamicMessage,
    options: &UnmarshalOptions,
    depth: u32,
    sink: &mut NonFatalSink,
) -> Result<usize, PathError> {
    let (payload, n) = wire::consume_bytes(&buf[pos..]).map_err(PathError::new)?;
    check_recursion(depth, options)?;
    let entry_descriptor = field
        .message_type
        .clone()
        .expect("map field carries a synthesized map-entry message_type");
    let mut tmp = DynamicMessage::new(entry_descriptor.clone());
    run_loop(payload, &mut tmp, options, depth + 1, sink, None)?;

    let key_field = entry_descriptor
        .field_by_number(1)
        .expect("map entry always has a key field");
    let value_field = entry_descriptor
        .field_by_number(2)
        .expect("map entry always has a value field");
    let key_value = entry_value(&tmp, key_field);
    let value_value = entry_value(&tmp, value_field);

    msg.mutable_map(field.number)
        .insert(MapKey::from_value(&key_value), value_value);
    Ok(pos + n)
}

fn entry_value(tmp: &DynamicMessage, field: &FieldDescriptor) -> Value {
    match tmp.get(field.number) {
        Some(FieldStorage::Singular(v)) => v.clone(),
        _ => match field.kind {
            Kind::Message | Kind::Group => Value::Message(Box::new(DynamicMessage::new(
                field
                    .message_type
                    .clone()
                    .expect("message-valued map entry field carries a message_type"),
            ))),
            kind => Value::default_for(kind),
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_extension(
    buf: &[u8],
    pos: usize,
    field: &Arc<FieldDescriptor>,
    wire_type: WireType,
    packed: bool,
    msg: &mut DynamicMessage,
    options: &UnmarshalOptions,
    depth: u32,
    sink: &mut NonFatalSink,
) -> Result<usize, PathError> {
    match field.kind {
        Kind::Message | Kind::Group => {
            let (value, n) = decode_extension_message(buf, pos, field, wire_type, options, depth, sink)?;
            msg.extensions_mut().append_decoded(field.clone(), value);
            Ok(n)
        }
        kind if packed => {
            let (payload, n) = wire::consume_bytes(&buf[pos..]).map_err(PathError::new)?;
            let mut consumed = 0;
            while consumed < payload.len() {
                let (value, vn, _) = decode_scalar(kind, kind.unpacked_wire_type(), &payload[consumed..])
                    .map_err(PathError::new)?;
                consumed += vn;
                msg.extensions_mut().append_decoded(field.clone(), value);
            }
            Ok(pos + n)
        }
        kind => {
            let (value, n, utf8_ok) = decode_scalar(kind, wire_type, &buf[pos..]).map_err(PathError::new)?;
            if !utf8_ok {
                sink.report(NonFatal::InvalidUtf8(field.name.clone()));
            }
            msg.extensions_mut().append_decoded(field.clone(), value);
            Ok(pos + n)
        }
    }
}

fn decode_extension_message(
    buf: &[u8],
    pos: usize,
    field: &FieldDescriptor,
    wire_type: WireType,
    options: &UnmarshalOptions,
    depth: u32,
    sink: &mut NonFatalSink,
) -> Result<(Value, usize), PathError> {
    check_recursion(depth, options)?;
    let sub_descriptor = field
        .message_type
        .clone()
        .expect("message/group extension carries a message_type");
    match wire_type {
        WireType::Len => {
            let (payload, n) = wire::consume_bytes(&buf[pos..]).map_err(PathError::new)?;
            let mut sub = DynamicMessage::new(sub_descriptor);
            run_loop(payload, &mut sub, options, depth + 1, sink, None)?;
            Ok((Value::Message(Box::new(sub)), pos + n))
        }
        WireType::SGroup => {
            let mut sub = DynamicMessage::new(sub_descriptor);
            let n = run_loop(&buf[pos..], &mut sub, options, depth + 1, sink, Some(field.number))?;
            Ok((Value::Message(Box::new(sub)), pos + n))
        }
        _ => Err(PathError::new(WireError::BadExtensionType)),
    }
}
