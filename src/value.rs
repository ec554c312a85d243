//! The dynamic value representation fields are stored as, independent of
//! any generated per-message Rust type. This is what lets one descriptor-
//! driven codec serve every message shape instead of being regenerated per
//! schema.

use crate::descriptor::Kind;
use crate::message::DynamicMessage;

/// A single field value. Repeated fields store a `Vec<Value>`; maps store
/// `(MapKey, Value)` pairs. See [`crate::message::FieldStorage`].
#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// The raw numeric value; name lookup goes through the field's
    /// `EnumDescriptor`.
    Enum(i32),
    Message(Box<DynamicMessage>),
}

impl Value {
    pub fn default_for(kind: Kind) -> Value {
        match kind {
            Kind::Bool => Value::Bool(false),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Value::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Value::I64(0),
            Kind::Uint32 | Kind::Fixed32 => Value::U32(0),
            Kind::Uint64 | Kind::Fixed64 => Value::U64(0),
            Kind::Float => Value::F32(0.0),
            Kind::Double => Value::F64(0.0),
            Kind::String => Value::String(String::new()),
            Kind::Bytes => Value::Bytes(Vec::new()),
            Kind::Enum => Value::Enum(0),
            Kind::Message | Kind::Group => {
                panic!("message/group fields have no scalar default")
            }
        }
    }

    pub fn is_default(&self, kind: Kind) -> bool {
        match (self, kind) {
            (Value::Bool(v), Kind::Bool) => !*v,
            (Value::I32(v), _) => *v == 0,
            (Value::I64(v), _) => *v == 0,
            (Value::U32(v), _) => *v == 0,
            (Value::U64(v), _) => *v == 0,
            (Value::F32(v), _) => *v == 0.0,
            (Value::F64(v), _) => *v == 0.0,
            (Value::String(v), _) => v.is_empty(),
            (Value::Bytes(v), _) => v.is_empty(),
            (Value::Enum(v), _) => *v == 0,
            (Value::Message(_), _) => false,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) | Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }
}

/// The narrower set of types legal as a protobuf map key: `int32`, `int64`,
/// `uint32`, `uint64`, `sint32`, `sint64`, `fixed32`, `fixed64`, `sfixed32`,
/// `sfixed64`, `bool`, or `string`. Distinct from [`Value`] so it can derive
/// `Eq`/`Hash` (floats and messages are excluded from the protobuf grammar
/// for map keys in the first place, so no information is lost).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl MapKey {
    pub fn default_for(kind: Kind) -> MapKey {
        match kind {
            Kind::Bool => MapKey::Bool(false),
            Kind::String => MapKey::String(String::new()),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => MapKey::I32(0),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => MapKey::I64(0),
            Kind::Uint32 | Kind::Fixed32 => MapKey::U32(0),
            Kind::Uint64 | Kind::Fixed64 => MapKey::U64(0),
            other => panic!("{other:?} is not a legal map key kind"),
        }
    }

    /// Ordering used for deterministic-mode marshal: numeric keys sort
    /// numerically, string keys lexicographically, bool keys false < true
    /// (spec §4.3 step 4).
    pub fn sort_key(&self) -> (u8, i128, &str) {
        match self {
            MapKey::Bool(v) => (0, *v as i128, ""),
            MapKey::I32(v) => (1, *v as i128, ""),
            MapKey::I64(v) => (1, *v as i128, ""),
            MapKey::U32(v) => (1, *v as i128, ""),
            MapKey::U64(v) => (1, *v as i128, ""),
            MapKey::String(s) => (2, 0, s.as_str()),
        }
    }

    pub fn debug_string(&self) -> String {
        match self {
            MapKey::Bool(v) => v.to_string(),
            MapKey::I32(v) => v.to_string(),
            MapKey::I64(v) => v.to_string(),
            MapKey::U32(v) => v.to_string(),
            MapKey::U64(v) => v.to_string(),
            MapKey::String(v) => v.clone(),
        }
    }

    pub fn is_default(&self) -> bool {
        match self {
            MapKey::Bool(v) => !*v,
            MapKey::I32(v) => *v == 0,
            MapKey::I64(v) => *v == 0,
            MapKey::U32(v) => *v == 0,
            MapKey::U64(v) => *v == 0,
            MapKey::String(v) => v.is_empty(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(v) => Value::Bool(*v),
            MapKey::I32(v) => Value::I32(*v),
            MapKey::I64(v) => Value::I64(*v),
            MapKey::U32(v) => Value::U32(*v),
            MapKey::U64(v) => Value::U64(*v),
            MapKey::String(v) => Value::String(v.clone()),
        }
    }

    /// Converts a decoded key-field [`Value`] into a [`MapKey`]; panics if
    /// `value` is not one of the kinds the map-key grammar allows (an
    /// invariant the field descriptor enforces upstream).
    pub fn from_value(value: &Value) -> MapKey {
        match value {
            Value::Bool(v) => MapKey::Bool(*v),
            Value::I32(v) => MapKey::I32(*v),
            Value::I64(v) => MapKey::I64(*v),
            Value::U32(v) => MapKey::U32(*v),
            Value::U64(v) => MapKey::U64(*v),
            Value::String(v) => MapKey::String(v.clone()),
            other => panic!("{other:?} is not a legal map key value"),
        }
    }
}
