//! A descriptor-driven Protocol Buffers wire-format codec.
//!
//! There is no generated per-message Rust type: every message shape is a
//! [`message::DynamicMessage`] whose layout comes entirely from a
//! [`descriptor::MessageDescriptor`] supplied at runtime. [`marshal::marshal`]
//! and [`unmarshal::unmarshal`] move a message to and from the wire;
//! [`ops`] provides the structural operations (`Equal`, `Clone`, `Merge`,
//! `Reset`, `IsInitialized`) that complete the data model.

pub mod descriptor;
pub mod error;
pub mod extension;
mod field_table;
pub mod marshal;
pub mod message;
pub mod ops;
pub mod size;
pub mod unmarshal;
pub mod value;
pub mod wire;

pub use descriptor::{
    Cardinality, EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor, Syntax,
};
pub use error::{CodecError, NonFatal, PathElement, PathError, WireError};
pub use extension::{ExtensionField, ExtensionStorage, ExtensionValue};
pub use field_table::field_table_for;
pub use marshal::{marshal, marshal_append, MarshalOptions};
pub use message::{DynamicMessage, FieldStorage, UnknownFields};
pub use size::size;
pub use unmarshal::{unmarshal, ExtensionResolver, UnmarshalOptions};
pub use value::{MapKey, Value};
