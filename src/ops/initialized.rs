//! Required-field check (spec §4.7): recursively walks every required field,
//! then every populated message-valued field, returning the first missing
//! required field's dotted path.

use crate::message::{DynamicMessage, FieldStorage};
use crate::value::Value;

/// Returns the dotted path (`name`, `name[i]`, `name{key}`) of the first
/// unset required field found, or `None` if the message and every message
/// it reaches is fully initialized.
pub fn is_initialized(msg: &DynamicMessage) -> Option<String> {
    walk(msg, "")
}

fn walk(msg: &DynamicMessage, prefix: &str) -> Option<String> {
    for &number in msg.descriptor().required_numbers() {
        if !msg.has(number) {
            let field = msg
                .descriptor()
                .field_by_number(number)
                .expect("required_numbers only lists numbers present in this descriptor");
            return Some(format!("{prefix}{}", field.name));
        }
    }

    for field in &msg.descriptor().fields {
        if !matches!(field.kind, crate::descriptor::Kind::Message | crate::descriptor::Kind::Group) {
            continue;
        }
        match msg.get(field.number) {
            Some(FieldStorage::Singular(Value::Message(sub))) => {
                if let Some(path) = walk(sub, &format!("{prefix}{}.", field.name)) {
                    return Some(path);
                }
            }
            Some(FieldStorage::Repeated(values)) => {
                for (index, value) in values.iter().enumerate() {
                    if let Value::Message(sub) = value {
                        if let Some(path) = walk(sub, &format!("{prefix}{}[{index}].", field.name)) {
                            return Some(path);
                        }
                    }
                }
            }
            Some(FieldStorage::Map(entries)) => {
                for (key, value) in entries {
                    if let Value::Message(sub) = value {
                        if let Some(path) = walk(sub, &format!("{prefix}{}[{}].", field.name, key.debug_string())) {
                            return Some(path);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Cardinality, FieldDescriptor, Kind, MessageDescriptor, Syntax};
    use std::sync::Arc;

    fn required_field(number: u32, name: &str) -> FieldDescriptor {
        FieldDescriptor {
            number,
            name: name.into(),
            json_name: name.into(),
            kind: Kind::Int32,
            cardinality: Cardinality::Required,
            packed: false,
            enum_type: None,
            message_type: None,
            map_entry: false,
            oneof_index: None,
            extension: false,
            extendee: None,
            syntax: Syntax::Proto2,
        }
    }

    #[test]
    fn reports_top_level_missing_required_field() {
        let descriptor = Arc::new(MessageDescriptor::new(
            "test.Required",
            vec![required_field(1, "id")],
            Vec::new(),
            Vec::new(),
            false,
            Syntax::Proto2,
        ));
        let msg = DynamicMessage::new(descriptor);
        assert_eq!(is_initialized(&msg).as_deref(), Some("id"));
    }

    #[test]
    fn recurses_into_populated_submessage() {
        let inner = Arc::new(MessageDescriptor::new(
            "test.Inner",
            vec![required_field(1, "id")],
            Vec::new(),
            Vec::new(),
            false,
            Syntax::Proto2,
        ));
        let mut outer_field = FieldDescriptor {
            number: 1,
            name: "inner".into(),
            json_name: "inner".into(),
            kind: Kind::Message,
            cardinality: Cardinality::Optional,
            packed: false,
            enum_type: None,
            message_type: Some(inner),
            map_entry: false,
            oneof_index: None,
            extension: false,
            extendee: None,
            syntax: Syntax::Proto2,
        };
        let outer_descriptor = Arc::new(MessageDescriptor::new(
            "test.Outer",
            vec![outer_field.clone()],
            Vec::new(),
            Vec::new(),
            false,
            Syntax::Proto2,
        ));
        outer_field.message_type = outer_descriptor.fields[0].message_type.clone();
        let mut msg = DynamicMessage::new(outer_descriptor);
        msg.mutable_message(&outer_field);
        assert_eq!(is_initialized(&msg).as_deref(), Some("inner.id"));
    }
}
