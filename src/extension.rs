//! Extension fields: fields declared outside their extendee's descriptor,
//! valid only within one of the extendee's declared extension ranges
//! (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::{FieldDescriptor, MessageDescriptor};
use crate::error::WireError;
use crate::field_table::{decode_scalar, encode_scalar, size_scalar};
use crate::value::Value;

/// Either a decoded value (cached after first [`ExtensionStorage::get`]) or
/// the raw, unparsed wire bytes captured because no descriptor was
/// available at unmarshal time.
#[derive(Clone, Debug)]
pub enum ExtensionValue {
    Decoded(Value),
    DecodedRepeated(Vec<Value>),
    /// Concatenated length-prefixed wire records (tag + payload each), not
    /// yet decoded.
    Raw(Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct ExtensionField {
    pub descriptor: Option<Arc<FieldDescriptor>>,
    pub value: ExtensionValue,
}

/// `field_number -> ExtensionField`, per extendee instance (spec §4.5).
#[derive(Default, Clone, Debug)]
pub struct ExtensionStorage {
    fields: HashMap<u32, ExtensionField>,
}

impl ExtensionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    /// Lazily decodes raw bytes on first access, caching the result and
    /// dropping the raw buffer, per spec §4.5.
    pub fn get(&mut self, number: u32) -> Result<Option<&ExtensionValue>, WireError> {
        let Some(entry) = self.fields.get_mut(&number) else {
            return Ok(None);
        };
        if let ExtensionValue::Raw(raw) = &entry.value {
            let descriptor = entry
                .descriptor
                .clone()
                .expect("raw extension bytes always carry the descriptor that classified them");
            let decoded = decode_raw_extension(&descriptor, raw)?;
            entry.value = decoded;
        }
        Ok(Some(&self.fields[&number].value))
    }

    /// Rejects a value whose type does not match `descriptor`'s declared
    /// element type, and any attempt to clear-via-set (spec §4.5: a
    /// "nil-valued set is an error" maps to `clear` being a distinct call).
    /// `extendee` is the message descriptor `descriptor.number` is being set
    /// on; a number outside every one of its declared extension ranges is
    /// `BadExtensionRange` (spec §4.5, §7).
    pub fn set(
        &mut self,
        descriptor: Arc<FieldDescriptor>,
        value: Value,
        extendee: &MessageDescriptor,
    ) -> Result<(), WireError> {
        if !extendee.is_extension_number(descriptor.number) {
            return Err(WireError::BadExtensionRange);
        }
        if !matches_kind(&value, descriptor.kind) {
            return Err(WireError::BadExtensionType);
        }
        if descriptor.is_repeated() {
            let slot = self
                .fields
                .entry(descriptor.number)
                .or_insert_with(|| ExtensionField {
                    descriptor: Some(descriptor.clone()),
                    value: ExtensionValue::DecodedRepeated(Vec::new()),
                });
            slot.descriptor = Some(descriptor);
            slot.value = ExtensionValue::DecodedRepeated(vec![value]);
        } else {
            self.fields.insert(
                descriptor.number,
                ExtensionField {
                    descriptor: Some(descriptor),
                    value: ExtensionValue::Decoded(value),
                },
            );
        }
        Ok(())
    }

    /// Merges one decoded occurrence in during unmarshal: appends to a
    /// repeated extension's list, replaces a singular one (spec §4.5 "merging
    /// during unmarshal appends", mirrored here for the repeated case; a
    /// singular extension re-occurring on the wire follows the same
    /// last-value-wins rule as an ordinary scalar field).
    pub fn append_decoded(&mut self, descriptor: Arc<FieldDescriptor>, value: Value) {
        if descriptor.is_repeated() {
            let slot = self.fields.entry(descriptor.number).or_insert_with(|| ExtensionField {
                descriptor: Some(descriptor.clone()),
                value: ExtensionValue::DecodedRepeated(Vec::new()),
            });
            slot.descriptor = Some(descriptor);
            match &mut slot.value {
                ExtensionValue::DecodedRepeated(values) => values.push(value),
                _ => slot.value = ExtensionValue::DecodedRepeated(vec![value]),
            }
        } else {
            self.fields.insert(
                descriptor.number,
                ExtensionField {
                    descriptor: Some(descriptor),
                    value: ExtensionValue::Decoded(value),
                },
            );
        }
    }

    pub fn clear(&mut self, number: u32) {
        self.fields.remove(&number);
    }

    pub fn clear_all(&mut self) {
        self.fields.clear();
    }

    pub fn descriptors(&self) -> Vec<Option<Arc<FieldDescriptor>>> {
        self.fields.values().map(|f| f.descriptor.clone()).collect()
    }

    /// Appends `raw` wire bytes for `number`, classifying it via `resolver`
    /// if possible. Used by the unmarshaler when a field number falls in an
    /// extendee's declared range.
    pub fn append_raw(
        &mut self,
        number: u32,
        descriptor: Option<Arc<FieldDescriptor>>,
        raw: &[u8],
    ) {
        let entry = self.fields.entry(number).or_insert_with(|| ExtensionField {
            descriptor: descriptor.clone(),
            value: ExtensionValue::Raw(Vec::new()),
        });
        if entry.descriptor.is_none() {
            entry.descriptor = descriptor;
        }
        match &mut entry.value {
            ExtensionValue::Raw(buf) => buf.extend_from_slice(raw),
            _ => {
                // Already decoded (e.g. `set` was called first): fall back
                // to appending as raw bytes is not meaningful here, so
                // leave the decoded value as-is; this only happens under
                // concurrent misuse of a single destination, which spec §5
                // declares the caller's responsibility.
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &ExtensionField)> {
        self.fields.iter().map(|(&n, f)| (n, f))
    }

    pub fn entry_mut(&mut self, number: u32) -> Option<&mut ExtensionField> {
        self.fields.get_mut(&number)
    }

    pub fn insert_raw_field(&mut self, number: u32, field: ExtensionField) {
        self.fields.insert(number, field);
    }
}

fn matches_kind(value: &Value, kind: crate::descriptor::Kind) -> bool {
    use crate::descriptor::Kind;
    matches!(
        (value, kind),
        (Value::Bool(_), Kind::Bool)
            | (Value::I32(_), Kind::Int32 | Kind::Sint32 | Kind::Sfixed32)
            | (Value::I64(_), Kind::Int64 | Kind::Sint64 | Kind::Sfixed64)
            | (Value::U32(_), Kind::Uint32 | Kind::Fixed32)
            | (Value::U64(_), Kind::Uint64 | Kind::Fixed64)
            | (Value::F32(_), Kind::Float)
            | (Value::F64(_), Kind::Double)
            | (Value::String(_), Kind::String)
            | (Value::Bytes(_), Kind::Bytes)
            | (Value::Enum(_), Kind::Enum)
            | (Value::Message(_), Kind::Message | Kind::Group)
    )
}

fn decode_raw_extension(
    descriptor: &FieldDescriptor,
    raw: &[u8],
) -> Result<ExtensionValue, WireError> {
    use crate::wire::consume_tag;

    if descriptor.is_repeated() {
        let mut values = Vec::new();
        let mut pos = 0;
        while pos < raw.len() {
            let ((_, wire_type), tag_n) = consume_tag(&raw[pos..])?;
            pos += tag_n;
            let (value, n) = decode_scalar(descriptor.kind, wire_type, &raw[pos..])?;
            pos += n;
            values.push(value);
        }
        Ok(ExtensionValue::DecodedRepeated(values))
    } else {
        let ((_, wire_type), tag_n) = consume_tag(raw)?;
        let (value, _n) = decode_scalar(descriptor.kind, wire_type, &raw[tag_n..])?;
        Ok(ExtensionValue::Decoded(value))
    }
}

/// Re-encodes a decoded (non-raw) extension value for marshal, including
/// its tag(s).
pub(crate) fn encode_extension(
    buf: &mut bytes::BytesMut,
    field: &ExtensionField,
) -> Result<(), WireError> {
    let Some(descriptor) = &field.descriptor else {
        if let ExtensionValue::Raw(raw) = &field.value {
            buf.extend_from_slice(raw);
            return Ok(());
        }
        return Ok(());
    };
    match &field.value {
        ExtensionValue::Raw(raw) => buf.extend_from_slice(raw),
        ExtensionValue::Decoded(value) => {
            crate::wire::append_tag(buf, descriptor.number, descriptor.kind.unpacked_wire_type());
            encode_scalar(buf, descriptor.kind, value);
        }
        ExtensionValue::DecodedRepeated(values) => {
            for value in values {
                crate::wire::append_tag(
                    buf,
                    descriptor.number,
                    descriptor.kind.unpacked_wire_type(),
                );
                encode_scalar(buf, descriptor.kind, value);
            }
        }
    }
    Ok(())
}

pub(crate) fn size_extension(field: &ExtensionField) -> usize {
    let Some(descriptor) = &field.descriptor else {
        return match &field.value {
            ExtensionValue::Raw(raw) => raw.len(),
            _ => 0,
        };
    };
    match &field.value {
        ExtensionValue::Raw(raw) => raw.len(),
        ExtensionValue::Decoded(value) => {
            crate::wire::size_tag(descriptor.number) + size_scalar(descriptor.kind, value)
        }
        ExtensionValue::DecodedRepeated(values) => values
            .iter()
            .map(|v| crate::wire::size_tag(descriptor.number) + size_scalar(descriptor.kind, v))
            .sum(),
    }
}
