//! Shared descriptor-building helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use protowire::{Cardinality, FieldDescriptor, Kind, MessageDescriptor, Syntax};

pub fn scalar(number: u32, name: &str, kind: Kind, cardinality: Cardinality, syntax: Syntax) -> FieldDescriptor {
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
        syntax,
    }
}

pub fn packed(mut field: FieldDescriptor) -> FieldDescriptor {
    field.packed = true;
    field
}

pub fn message_field(
    number: u32,
    name: &str,
    cardinality: Cardinality,
    message_type: Arc<MessageDescriptor>,
    syntax: Syntax,
) -> FieldDescriptor {
    FieldDescriptor {
        number,
        name: name.into(),
        json_name: name.into(),
        kind: Kind::Message,
        cardinality,
        packed: false,
        enum_type: None,
        message_type: Some(message_type),
        map_entry: false,
        oneof_index: None,
        extension: false,
        extendee: None,
        syntax,
    }
}

pub fn group_field(
    number: u32,
    name: &str,
    message_type: Arc<MessageDescriptor>,
    syntax: Syntax,
) -> FieldDescriptor {
    let mut field = message_field(number, name, Cardinality::Optional, message_type, syntax);
    field.kind = Kind::Group;
    field
}

pub fn oneof_member(mut field: FieldDescriptor, oneof_index: usize) -> FieldDescriptor {
    field.oneof_index = Some(oneof_index);
    field
}

pub fn extension_field(
    number: u32,
    name: &str,
    kind: Kind,
    extendee: &str,
    cardinality: Cardinality,
) -> FieldDescriptor {
    let mut field = scalar(number, name, kind, cardinality, Syntax::Proto2);
    field.extension = true;
    field.extendee = Some(extendee.into());
    field
}

pub fn message(full_name: &str, fields: Vec<FieldDescriptor>, syntax: Syntax) -> Arc<MessageDescriptor> {
    Arc::new(MessageDescriptor::new(full_name, fields, Vec::new(), Vec::new(), false, syntax))
}

pub fn message_with_extensions(
    full_name: &str,
    fields: Vec<FieldDescriptor>,
    extension_ranges: Vec<(u32, u32)>,
    syntax: Syntax,
) -> Arc<MessageDescriptor> {
    Arc::new(MessageDescriptor::new(
        full_name,
        fields,
        Vec::new(),
        extension_ranges,
        false,
        syntax,
    ))
}
