//! Reset (spec §4.10): clears every known field, extension, and the
//! unknown-field buffer. [`DynamicMessage::reset`] already does this in
//! place; this just gives the operation a name alongside its siblings.

use crate::message::DynamicMessage;

pub fn reset(msg: &mut DynamicMessage) {
    msg.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Cardinality, FieldDescriptor, Kind, MessageDescriptor, Syntax};
    use crate::value::Value;
    use std::sync::Arc;

    #[test]
    fn reset_clears_populated_fields() {
        let field = FieldDescriptor {
            number: 1,
            name: "x".into(),
            json_name: "x".into(),
            kind: Kind::Int32,
            cardinality: Cardinality::SingularProto3,
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
            "test.Reset",
            vec![field.clone()],
            Vec::new(),
            Vec::new(),
            false,
            Syntax::Proto3,
        ));
        let mut msg = DynamicMessage::new(descriptor);
        msg.set_singular(&field, Value::I32(42));
        reset(&mut msg);
        assert!(!msg.has(1));
    }
}
