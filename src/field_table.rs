//! Builds, per message type, an ordered dispatch table of field codecs
//! keyed by wire tag (spec §4.2), plus the per-kind scalar encode/decode/
//! size primitives every higher-level operation is built from.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use bytes::BytesMut;

use crate::descriptor::{FieldDescriptor, Kind, MessageDescriptor};
use crate::error::WireError;
use crate::value::Value;
use crate::wire::{
    self, consume_bytes, consume_fixed32, consume_fixed64, consume_varint, WireType,
};

/// Field numbers below this use the fast array; at or above it, the slow map.
pub const FAST_LIMIT: usize = 1024;

/// A precomputed dispatch table for one message type. Built once and shared
/// (spec §4.2, §5): readers take the cache's read lock, a miss builds a
/// fresh table and installs it first-build-wins.
pub struct FieldTable {
    descriptor: Arc<MessageDescriptor>,
    fast: Vec<Option<usize>>,
    slow: HashMap<u32, usize>,
    name_to_index: HashMap<String, usize>,
    required_numbers: Vec<u32>,
    sorted_numbers: Vec<u32>,
}

impl FieldTable {
    fn build(descriptor: Arc<MessageDescriptor>) -> Self {
        tracing::debug!(message = %descriptor.full_name, fields = descriptor.fields.len(), "building field table");
        let mut fast = vec![None; FAST_LIMIT];
        let mut slow = HashMap::new();
        let mut name_to_index = HashMap::with_capacity(descriptor.fields.len());
        let mut sorted_numbers = Vec::with_capacity(descriptor.fields.len());

        for (index, field) in descriptor.fields.iter().enumerate() {
            if (field.number as usize) < FAST_LIMIT {
                fast[field.number as usize] = Some(index);
            } else {
                slow.insert(field.number, index);
            }
            name_to_index.insert(field.name.clone(), index);
            sorted_numbers.push(field.number);
        }
        sorted_numbers.sort_unstable();

        let required_numbers = descriptor.required_numbers().to_vec();

        Self {
            descriptor,
            fast,
            slow,
            name_to_index,
            required_numbers,
            sorted_numbers,
        }
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    pub fn lookup(&self, number: u32) -> Option<&FieldDescriptor> {
        let index = if (number as usize) < FAST_LIMIT {
            *self.fast.get(number as usize)?
        } else {
            *self.slow.get(&number)?
        };
        Some(&self.descriptor.fields[index])
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.name_to_index.get(name).map(|&i| &self.descriptor.fields[i])
    }

    pub fn required_numbers(&self) -> &[u32] {
        &self.required_numbers
    }

    /// Ascending field numbers, used by the marshaler in deterministic mode.
    pub fn sorted_numbers(&self) -> &[u32] {
        &self.sorted_numbers
    }
}

type TableCache = RwLock<HashMap<usize, Arc<FieldTable>>>;

fn table_cache() -> &'static TableCache {
    static CACHE: OnceLock<TableCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the memoized [`FieldTable`] for `descriptor`, building one if
/// this is the first time this descriptor instance has been seen. Keyed by
/// the descriptor's `Arc` identity, matching "once per type per process".
pub fn field_table_for(descriptor: &Arc<MessageDescriptor>) -> Arc<FieldTable> {
    let key = Arc::as_ptr(descriptor) as usize;
    if let Some(table) = table_cache().read().unwrap().get(&key) {
        return table.clone();
    }
    let built = Arc::new(FieldTable::build(descriptor.clone()));
    let mut cache = table_cache().write().unwrap();
    // First-build-wins: if another thread raced us, keep whichever landed first.
    cache.entry(key).or_insert_with(|| built.clone());
    cache.get(&key).unwrap().clone()
}

/// How a field number's wire type on the stream relates to what the
/// descriptor expects.
#[derive(Debug, PartialEq, Eq)]
pub enum WireMatch {
    /// Decode using the field's ordinary per-element wire type.
    Singular,
    /// A packed repeated-scalar record: decode a run of elements from one
    /// `Len` payload.
    Packed,
    /// Neither applies; treat the field as unknown.
    Mismatch,
}

/// Classifies an incoming `wire_type` against `field`, applying the
/// packed/unpacked interoperability rule from spec §4.4: both forms are
/// always accepted for a packable repeated scalar, regardless of the
/// descriptor's own `packed` flag.
pub fn classify_wire(field: &FieldDescriptor, wire_type: WireType) -> WireMatch {
    if field.is_repeated() && field.kind.is_packable() {
        if wire_type == WireType::Len {
            return WireMatch::Packed;
        }
        if wire_type == field.kind.unpacked_wire_type() {
            return WireMatch::Singular;
        }
        return WireMatch::Mismatch;
    }
    let expected = field.kind.unpacked_wire_type();
    if wire_type == expected {
        WireMatch::Singular
    } else {
        WireMatch::Mismatch
    }
}

/// Decodes one scalar value's body (no tag) for `kind` off the front of
/// `buf`. Returns the value, bytes consumed, and (for `string` only)
/// whether the bytes were valid UTF-8 — invalid UTF-8 is still placed into
/// the message (lossily), with the failure surfaced as a non-fatal
/// condition by the caller (spec invariant 4).
pub fn decode_scalar(
    kind: Kind,
    wire_type: WireType,
    buf: &[u8],
) -> Result<(Value, usize, bool), WireError> {
    match kind {
        Kind::Bool => {
            let (v, n) = consume_varint(buf)?;
            Ok((Value::Bool(v != 0), n, true))
        }
        Kind::Int32 => {
            let (v, n) = consume_varint(buf)?;
            Ok((Value::I32(v as u32 as i32), n, true))
        }
        Kind::Int64 => {
            let (v, n) = consume_varint(buf)?;
            Ok((Value::I64(v as i64), n, true))
        }
        Kind::Uint32 => {
            let (v, n) = consume_varint(buf)?;
            Ok((Value::U32(v as u32), n, true))
        }
        Kind::Uint64 => {
            let (v, n) = consume_varint(buf)?;
            Ok((Value::U64(v), n, true))
        }
        Kind::Sint32 => {
            let (v, n) = consume_varint(buf)?;
            Ok((Value::I32(wire::zigzag32_decode(v as u32)), n, true))
        }
        Kind::Sint64 => {
            let (v, n) = consume_varint(buf)?;
            Ok((Value::I64(wire::zigzag64_decode(v)), n, true))
        }
        Kind::Fixed32 => {
            let (v, n) = consume_fixed32(buf)?;
            Ok((Value::U32(v), n, true))
        }
        Kind::Fixed64 => {
            let (v, n) = consume_fixed64(buf)?;
            Ok((Value::U64(v), n, true))
        }
        Kind::Sfixed32 => {
            let (v, n) = consume_fixed32(buf)?;
            Ok((Value::I32(v as i32), n, true))
        }
        Kind::Sfixed64 => {
            let (v, n) = consume_fixed64(buf)?;
            Ok((Value::I64(v as i64), n, true))
        }
        Kind::Float => {
            let (v, n) = consume_fixed32(buf)?;
            Ok((Value::F32(f32::from_bits(v)), n, true))
        }
        Kind::Double => {
            let (v, n) = consume_fixed64(buf)?;
            Ok((Value::F64(f64::from_bits(v)), n, true))
        }
        Kind::Enum => {
            let (v, n) = consume_varint(buf)?;
            Ok((Value::Enum(v as u32 as i32), n, true))
        }
        Kind::Bytes => {
            let (payload, n) = consume_bytes(buf)?;
            Ok((Value::Bytes(payload.to_vec()), n, true))
        }
        Kind::String => {
            let (payload, n) = consume_bytes(buf)?;
            match std::str::from_utf8(payload) {
                Ok(s) => Ok((Value::String(s.to_owned()), n, true)),
                Err(_) => Ok((
                    Value::String(String::from_utf8_lossy(payload).into_owned()),
                    n,
                    false,
                )),
            }
        }
        Kind::Message | Kind::Group => {
            let _ = wire_type;
            panic!("decode_scalar does not handle message/group kinds")
        }
    }
}

/// Appends `value`'s body (no tag) for `kind`.
pub fn encode_scalar(buf: &mut BytesMut, kind: Kind, value: &Value) {
    match (kind, value) {
        (Kind::Bool, Value::Bool(v)) => wire::append_varint(buf, *v as u64),
        (Kind::Int32, Value::I32(v)) => wire::append_varint(buf, *v as i64 as u64),
        (Kind::Int64, Value::I64(v)) => wire::append_varint(buf, *v as u64),
        (Kind::Uint32, Value::U32(v)) => wire::append_varint(buf, *v as u64),
        (Kind::Uint64, Value::U64(v)) => wire::append_varint(buf, *v),
        (Kind::Sint32, Value::I32(v)) => wire::append_varint(buf, wire::zigzag32_encode(*v) as u64),
        (Kind::Sint64, Value::I64(v)) => wire::append_varint(buf, wire::zigzag64_encode(*v)),
        (Kind::Fixed32, Value::U32(v)) => wire::append_fixed32(buf, *v),
        (Kind::Fixed64, Value::U64(v)) => wire::append_fixed64(buf, *v),
        (Kind::Sfixed32, Value::I32(v)) => wire::append_fixed32(buf, *v as u32),
        (Kind::Sfixed64, Value::I64(v)) => wire::append_fixed64(buf, *v as u64),
        (Kind::Float, Value::F32(v)) => wire::append_fixed32(buf, v.to_bits()),
        (Kind::Double, Value::F64(v)) => wire::append_fixed64(buf, v.to_bits()),
        (Kind::Enum, Value::Enum(v)) => wire::append_varint(buf, *v as i64 as u64),
        (Kind::Bytes, Value::Bytes(v)) => {
            wire::append_varint(buf, v.len() as u64);
            buf.extend_from_slice(v);
        }
        (Kind::String, Value::String(v)) => {
            wire::append_varint(buf, v.len() as u64);
            buf.extend_from_slice(v.as_bytes());
        }
        (kind, value) => panic!("{kind:?} cannot encode a {value:?} value"),
    }
}

/// Body length (no tag) `encode_scalar` would produce for `value`.
pub fn size_scalar(kind: Kind, value: &Value) -> usize {
    match (kind, value) {
        (Kind::Bool, Value::Bool(v)) => wire::size_varint(*v as u64),
        (Kind::Int32, Value::I32(v)) => wire::size_varint(*v as i64 as u64),
        (Kind::Int64, Value::I64(v)) => wire::size_varint(*v as u64),
        (Kind::Uint32, Value::U32(v)) => wire::size_varint(*v as u64),
        (Kind::Uint64, Value::U64(v)) => wire::size_varint(*v),
        (Kind::Sint32, Value::I32(v)) => wire::size_varint(wire::zigzag32_encode(*v) as u64),
        (Kind::Sint64, Value::I64(v)) => wire::size_varint(wire::zigzag64_encode(*v)),
        (Kind::Fixed32, _) | (Kind::Sfixed32, _) | (Kind::Float, _) => 4,
        (Kind::Fixed64, _) | (Kind::Sfixed64, _) | (Kind::Double, _) => 8,
        (Kind::Enum, Value::Enum(v)) => wire::size_varint(*v as i64 as u64),
        (Kind::Bytes, Value::Bytes(v)) => wire::size_varint(v.len() as u64) + v.len(),
        (Kind::String, Value::String(v)) => wire::size_varint(v.len() as u64) + v.len(),
        (kind, value) => panic!("{kind:?} cannot size a {value:?} value"),
    }
}
