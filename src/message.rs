//! The message-access capability surface (spec §3) and its one concrete
//! implementation: a descriptor-driven dynamic message. Rather than
//! generating a distinct Rust type per `.proto` message (which this crate,
//! being the runtime and not a code generator, cannot do), every message
//! shape is represented by the same [`DynamicMessage`], with its layout
//! entirely determined by the [`MessageDescriptor`] it carries.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::{Cardinality, FieldDescriptor, MessageDescriptor};
use crate::extension::ExtensionStorage;
use crate::value::{MapKey, Value};

/// How a single field's value is physically stored.
#[derive(Clone, Debug)]
pub enum FieldStorage {
    Singular(Value),
    Repeated(Vec<Value>),
    Map(HashMap<MapKey, Value>),
}

/// Preserves wire records for field numbers the local descriptor doesn't
/// know about, keyed by field number, concatenated in order of occurrence
/// (spec invariant 5: grouping by number is guaranteed, relative order
/// across numbers is not).
#[derive(Default, Clone, Debug)]
pub struct UnknownFields {
    order: Vec<u32>,
    bytes: HashMap<u32, Vec<u8>>,
}

impl UnknownFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends one raw record (tag + payload, or a whole `SGROUP..EGROUP`
    /// span) for `number`.
    pub fn push(&mut self, number: u32, record: &[u8]) {
        if !self.bytes.contains_key(&number) {
            self.order.push(number);
        }
        self.bytes.entry(number).or_default().extend_from_slice(record);
    }

    /// Replaces the whole buffer wholesale, as `set_unknown_bytes` in the
    /// message capability surface (spec §6) requires. `concatenated` is
    /// re-parsed into per-number groups on the next marshal only in the
    /// sense that it is re-emitted byte-for-byte; here we simply accept
    /// pre-grouped `(number, bytes)` pairs.
    pub fn set_all(&mut self, fields: Vec<(u32, Vec<u8>)>) {
        self.order.clear();
        self.bytes.clear();
        for (number, record) in fields {
            self.push(number, &record);
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.bytes.clear();
    }

    /// Iterates records in first-appearance order, one slice per field
    /// number (spec §5 ordering guarantee for deterministic marshal).
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.order.iter().map(move |&n| (n, self.bytes[&n].as_slice()))
    }

    pub fn merge_from(&mut self, other: &UnknownFields) {
        for (number, record) in other.iter() {
            self.push(number, record);
        }
    }
}

impl PartialEq for UnknownFields {
    // Order across different numbers is immaterial (spec §4.6.3); only the
    // per-number byte groups need to match.
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

/// A descriptor-driven message value: every field is stored by number in a
/// sparse map, oneof cases are tracked per-oneof, and unknown/extension data
/// round-trips verbatim.
#[derive(Clone, Debug)]
pub struct DynamicMessage {
    descriptor: Arc<MessageDescriptor>,
    fields: HashMap<u32, FieldStorage>,
    /// oneof index -> the field number currently set within it.
    oneof_case: HashMap<usize, u32>,
    unknown: UnknownFields,
    extensions: ExtensionStorage,
}

impl DynamicMessage {
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        Self {
            descriptor,
            fields: HashMap::new(),
            oneof_case: HashMap::new(),
            unknown: UnknownFields::new(),
            extensions: ExtensionStorage::new(),
        }
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    pub fn unknown_fields(&self) -> &UnknownFields {
        &self.unknown
    }

    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFields {
        &mut self.unknown
    }

    pub fn extensions(&self) -> &ExtensionStorage {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionStorage {
        &mut self.extensions
    }

    /// Probe: is field `number` set?
    ///
    /// For a `SingularProto3` scalar (implicit presence) this reports
    /// whether the stored value differs from the kind's default, matching
    /// proto3's classic has-less API; every other cardinality reports
    /// whether a value was ever written.
    pub fn has(&self, number: u32) -> bool {
        let Some(field) = self.descriptor.field_by_number(number) else {
            return false;
        };
        match self.fields.get(&number) {
            Some(FieldStorage::Singular(v)) => match field.cardinality {
                Cardinality::SingularProto3 if field.kind != crate::descriptor::Kind::Message => {
                    !v.is_default(field.kind)
                }
                _ => true,
            },
            Some(FieldStorage::Repeated(v)) => !v.is_empty(),
            Some(FieldStorage::Map(v)) => !v.is_empty(),
            None => false,
        }
    }

    pub fn get(&self, number: u32) -> Option<&FieldStorage> {
        self.fields.get(&number)
    }

    pub fn get_mut(&mut self, number: u32) -> Option<&mut FieldStorage> {
        self.fields.get_mut(&number)
    }

    pub fn oneof_case(&self, oneof_index: usize) -> Option<u32> {
        self.oneof_case.get(&oneof_index).copied()
    }

    /// Sets a singular (scalar or message) field, clearing any sibling
    /// oneof members first (spec invariant 1).
    pub fn set_singular(&mut self, field: &FieldDescriptor, value: Value) {
        self.clear_oneof_siblings(field);
        self.fields.insert(field.number, FieldStorage::Singular(value));
    }

    /// Returns the existing sub-message to merge into, if `field` is
    /// already set to the same oneof case; otherwise installs a fresh
    /// default and returns that (implements the oneof message-merge
    /// exception in spec §4.4 step 3).
    pub fn mutable_message(&mut self, field: &FieldDescriptor) -> &mut DynamicMessage {
        let already_this_case = field
            .oneof_index
            .map(|idx| self.oneof_case.get(&idx) == Some(&field.number))
            .unwrap_or(true);
        let needs_fresh = !already_this_case || !matches!(self.fields.get(&field.number), Some(FieldStorage::Singular(Value::Message(_))));
        if needs_fresh {
            self.clear_oneof_siblings(field);
            let sub = DynamicMessage::new(
                field
                    .message_type
                    .clone()
                    .expect("message field must carry a message_type"),
            );
            self.fields
                .insert(field.number, FieldStorage::Singular(Value::Message(Box::new(sub))));
            if let Some(idx) = field.oneof_index {
                self.oneof_case.insert(idx, field.number);
            }
        }
        match self.fields.get_mut(&field.number) {
            Some(FieldStorage::Singular(Value::Message(m))) => m,
            _ => unreachable!("just installed a Singular(Message) above"),
        }
    }

    pub fn mutable_repeated(&mut self, number: u32) -> &mut Vec<Value> {
        match self
            .fields
            .entry(number)
            .or_insert_with(|| FieldStorage::Repeated(Vec::new()))
        {
            FieldStorage::Repeated(v) => v,
            _ => unreachable!("field was already set to a non-repeated storage kind"),
        }
    }

    pub fn mutable_map(&mut self, number: u32) -> &mut HashMap<MapKey, Value> {
        match self
            .fields
            .entry(number)
            .or_insert_with(|| FieldStorage::Map(HashMap::new()))
        {
            FieldStorage::Map(v) => v,
            _ => unreachable!("field was already set to a non-map storage kind"),
        }
    }

    /// Installs an already-built [`FieldStorage`] for `number` directly,
    /// without clearing oneof siblings first. Used by [`crate::ops::clone`]
    /// and [`crate::ops::merge`], which construct the replacement storage
    /// themselves and only need oneof-case bookkeeping updated to match.
    pub(crate) fn set_storage(&mut self, number: u32, storage: FieldStorage) {
        if let (Some(field), FieldStorage::Singular(_)) = (self.descriptor.field_by_number(number), &storage) {
            if let Some(idx) = field.oneof_index {
                self.oneof_case.insert(idx, number);
            }
        }
        self.fields.insert(number, storage);
    }

    pub fn clear(&mut self, number: u32) {
        self.fields.remove(&number);
        if let Some(field) = self.descriptor.field_by_number(number) {
            if let Some(idx) = field.oneof_index {
                if self.oneof_case.get(&idx) == Some(&number) {
                    self.oneof_case.remove(&idx);
                }
            }
        }
    }

    fn clear_oneof_siblings(&mut self, field: &FieldDescriptor) {
        let Some(idx) = field.oneof_index else { return };
        if let Some(&current) = self.oneof_case.get(&idx) {
            if current != field.number {
                self.fields.remove(&current);
            }
        }
        self.oneof_case.insert(idx, field.number);
    }

    /// Clears every known field, extension, and the unknown-field buffer
    /// (spec §4.10).
    pub fn reset(&mut self) {
        self.fields.clear();
        self.oneof_case.clear();
        self.unknown.clear();
        self.extensions.clear();
    }
}
