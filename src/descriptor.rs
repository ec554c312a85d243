//! Schema surface the codec consumes. Descriptors are built once by a
//! collaborator (a `.proto` compiler or a hand-authored schema) and are
//! immutable afterwards; the codec never mutates them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::wire::WireType;

/// The logical type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    String,
    Bytes,
    /// Int32-valued; the concrete `EnumDescriptor` lives on the field.
    Enum,
    Message,
    Group,
}

impl Kind {
    /// The wire type used when this kind is *not* packed (packed repeated
    /// scalars always use `Len` regardless of their element's own wire type).
    pub fn unpacked_wire_type(self) -> WireType {
        match self {
            Kind::Bool
            | Kind::Int32
            | Kind::Int64
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Enum => WireType::Varint,
            Kind::Fixed64 | Kind::Sfixed64 | Kind::Double => WireType::Fixed64,
            Kind::Fixed32 | Kind::Sfixed32 | Kind::Float => WireType::Fixed32,
            Kind::String | Kind::Bytes | Kind::Message => WireType::Len,
            Kind::Group => WireType::SGroup,
        }
    }

    /// Whether a repeated field of this kind may use the packed encoding.
    /// `string`, `bytes`, and message/group kinds can never be packed.
    pub fn is_packable(self) -> bool {
        !matches!(self, Kind::String | Kind::Bytes | Kind::Message | Kind::Group)
    }
}

/// Field cardinality, independent of `Kind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
    /// A proto3 scalar field with implicit (not explicitly tracked) presence.
    SingularProto3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

/// A single enum value: a closed (proto2) enum rejects unrecognized numbers
/// at decode time by treating them as unknown bytes; an open (proto3) enum
/// accepts any `i32`.
#[derive(Debug)]
pub struct EnumDescriptor {
    pub full_name: String,
    pub closed: bool,
    values_by_number: HashMap<i32, String>,
    default_number: i32,
}

impl EnumDescriptor {
    pub fn new(
        full_name: impl Into<String>,
        closed: bool,
        values: Vec<(i32, String)>,
    ) -> Self {
        let default_number = values.first().map(|(n, _)| *n).unwrap_or(0);
        Self {
            full_name: full_name.into(),
            closed,
            values_by_number: values.into_iter().collect(),
            default_number,
        }
    }

    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values_by_number.get(&number).map(String::as_str)
    }

    pub fn is_known(&self, number: i32) -> bool {
        self.values_by_number.contains_key(&number)
    }

    pub fn default_number(&self) -> i32 {
        self.default_number
    }
}

/// `{ number, name, json_name, kind, cardinality, packed?, default?,
///    enum_type?, message_type?, map_entry?, oneof_parent?, extension?,
///    extendee?, syntax }` from spec §3.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub number: u32,
    pub name: String,
    pub json_name: String,
    pub kind: Kind,
    pub cardinality: Cardinality,
    pub packed: bool,
    pub enum_type: Option<Arc<EnumDescriptor>>,
    pub message_type: Option<Arc<MessageDescriptor>>,
    pub map_entry: bool,
    pub oneof_index: Option<usize>,
    pub extension: bool,
    pub extendee: Option<String>,
    pub syntax: Syntax,
}

impl FieldDescriptor {
    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::Required
    }

    /// Strings/repeated-strings whose UTF-8 validity must be checked per
    /// spec invariant 4: proto3 strings always, proto2 optional/repeated
    /// strings as well (proto2 required strings are checked too; only
    /// extension-carried raw bytes skip this).
    pub fn needs_utf8_check(&self) -> bool {
        self.kind == Kind::String
    }

    pub fn effective_wire_type(&self) -> WireType {
        if self.is_repeated() && self.packed && self.kind.is_packable() {
            WireType::Len
        } else {
            self.kind.unpacked_wire_type()
        }
    }
}

#[derive(Clone, Debug)]
pub struct OneofDescriptor {
    pub name: String,
    pub index: usize,
    /// Field numbers belonging to this oneof, in declaration order.
    pub member_numbers: Vec<u32>,
}

/// `{ full_name, fields (by number and by name), oneofs, required_numbers,
///    extension_ranges (sorted), is_map_entry }` from spec §3.
#[derive(Debug)]
pub struct MessageDescriptor {
    pub full_name: String,
    pub fields: Vec<FieldDescriptor>,
    pub oneofs: Vec<OneofDescriptor>,
    pub is_map_entry: bool,
    pub syntax: Syntax,
    /// Sorted, inclusive `[lo, hi]` extension-number ranges.
    extension_ranges: Vec<(u32, u32)>,
    fields_by_number: HashMap<u32, usize>,
    fields_by_name: HashMap<String, usize>,
    required_numbers: Vec<u32>,
}

impl MessageDescriptor {
    pub fn new(
        full_name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
        oneofs: Vec<OneofDescriptor>,
        mut extension_ranges: Vec<(u32, u32)>,
        is_map_entry: bool,
        syntax: Syntax,
    ) -> Self {
        extension_ranges.sort_unstable();
        let mut fields_by_number = HashMap::with_capacity(fields.len());
        let mut fields_by_name = HashMap::with_capacity(fields.len());
        let mut required_numbers = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            fields_by_number.insert(field.number, index);
            fields_by_name.insert(field.name.clone(), index);
            if field.is_required() {
                required_numbers.push(field.number);
            }
        }
        required_numbers.sort_unstable();
        Self {
            full_name: full_name.into(),
            fields,
            oneofs,
            is_map_entry,
            syntax,
            extension_ranges,
            fields_by_number,
            fields_by_name,
            required_numbers,
        }
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields_by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields_by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn required_numbers(&self) -> &[u32] {
        &self.required_numbers
    }

    pub fn extension_ranges(&self) -> &[(u32, u32)] {
        &self.extension_ranges
    }

    pub fn is_extension_number(&self, number: u32) -> bool {
        self.extension_ranges
            .iter()
            .any(|&(lo, hi)| number >= lo && number <= hi)
    }

    /// Synthesizes the `{1: key, 2: value}` sub-message descriptor for a
    /// `map<K, V>` field, per spec invariant 2.
    pub fn map_entry(key: Kind, value_field: FieldDescriptor, syntax: Syntax) -> Arc<Self> {
        let key_field = FieldDescriptor {
            number: 1,
            name: "key".into(),
            json_name: "key".into(),
            kind: key,
            cardinality: Cardinality::SingularProto3,
            packed: false,
            enum_type: None,
            message_type: None,
            map_entry: false,
            oneof_index: None,
            extension: false,
            extendee: None,
            syntax,
        };
        let mut value_field = value_field;
        value_field.number = 2;
        value_field.name = "value".into();
        value_field.json_name = "value".into();
        value_field.oneof_index = None;
        Arc::new(MessageDescriptor::new(
            "map.entry",
            vec![key_field, value_field],
            Vec::new(),
            Vec::new(),
            true,
            syntax,
        ))
    }
}
