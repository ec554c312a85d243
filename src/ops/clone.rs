//! Deep clone (spec §4.8): every field, the unknown-field buffer, and the
//! extension table are copied by content, never aliased.

use std::collections::HashMap;

use crate::extension::{ExtensionField, ExtensionStorage, ExtensionValue};
use crate::message::{DynamicMessage, FieldStorage};
use crate::value::Value;

/// Deep-clones `msg`: nested messages, repeated lists, and maps are
/// recursively copied rather than `Arc`-shared.
pub fn clone_message(msg: &DynamicMessage) -> DynamicMessage {
    let mut out = DynamicMessage::new(msg.descriptor().clone());

    for field in &msg.descriptor().fields {
        if let Some(storage) = msg.get(field.number) {
            out.set_storage(field.number, clone_storage(storage));
        }
    }

    out.unknown_fields_mut().merge_from(msg.unknown_fields());
    *out.extensions_mut() = clone_extensions(msg.extensions());
    out
}

fn clone_storage(storage: &FieldStorage) -> FieldStorage {
    match storage {
        FieldStorage::Singular(v) => FieldStorage::Singular(clone_value(v)),
        FieldStorage::Repeated(values) => {
            FieldStorage::Repeated(values.iter().map(clone_value).collect())
        }
        FieldStorage::Map(entries) => {
            let cloned: HashMap<_, _> = entries.iter().map(|(k, v)| (k.clone(), clone_value(v))).collect();
            FieldStorage::Map(cloned)
        }
    }
}

fn clone_value(value: &Value) -> Value {
    match value {
        Value::Message(m) => Value::Message(Box::new(clone_message(m))),
        other => other.clone(),
    }
}

fn clone_extensions(extensions: &ExtensionStorage) -> ExtensionStorage {
    let mut out = ExtensionStorage::new();
    for (number, field) in extensions.iter() {
        let value = match &field.value {
            ExtensionValue::Raw(bytes) => ExtensionValue::Raw(bytes.clone()),
            ExtensionValue::Decoded(v) => ExtensionValue::Decoded(clone_value(v)),
            ExtensionValue::DecodedRepeated(values) => {
                ExtensionValue::DecodedRepeated(values.iter().map(clone_value).collect())
            }
        };
        out.insert_raw_field(
            number,
            ExtensionField {
                descriptor: field.descriptor.clone(),
                value,
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Cardinality, FieldDescriptor, Kind, MessageDescriptor, Syntax};
    use crate::ops::equal::equal;
    use std::sync::Arc;

    #[test]
    fn clone_is_equal_but_not_aliased() {
        let field = FieldDescriptor {
            number: 1,
            name: "tags".into(),
            json_name: "tags".into(),
            kind: Kind::String,
            cardinality: Cardinality::Repeated,
            packed: false,
            enum_type: None,
            message_type: None,
            map_entry: false,
            oneof_index: None,
            extension: false,
            extendee: None,
            syntax: Syntax::Proto3,
        };
        let descriptor = Arc::new(MessageDescriptor::new(
            "test.Clone",
            vec![field],
            Vec::new(),
            Vec::new(),
            false,
            Syntax::Proto3,
        ));
        let mut original = DynamicMessage::new(descriptor);
        original.mutable_repeated(1).push(Value::String("a".into()));

        let mut cloned = clone_message(&original);
        assert!(equal(&original, &cloned).unwrap());

        cloned.mutable_repeated(1).push(Value::String("b".into()));
        assert!(!equal(&original, &cloned).unwrap());
    }
}
