mod common;

use protowire::{Cardinality, DynamicMessage, Kind, MapKey, MarshalOptions, Syntax, UnmarshalOptions, Value};

fn map_descriptor() -> (std::sync::Arc<protowire::MessageDescriptor>, protowire::FieldDescriptor) {
    let value_field = common::scalar(2, "value", Kind::String, Cardinality::SingularProto3, Syntax::Proto3);
    let entry = protowire::MessageDescriptor::map_entry(Kind::Int32, value_field, Syntax::Proto3);
    let mut map_field = common::message_field(7, "m", Cardinality::Repeated, entry, Syntax::Proto3);
    map_field.map_entry = true;
    let descriptor = common::message("test.WithMap", vec![map_field.clone()], Syntax::Proto3);
    (descriptor, map_field)
}

#[test]
fn missing_value_in_map_entry_decodes_to_default() {
    let (descriptor, field) = map_descriptor();
    let wire_bytes = [0x3A, 0x02, 0x08, 0x01]; // tag 7 LEN, entry { key=1 }
    let mut msg = DynamicMessage::new(descriptor);
    protowire::unmarshal(&wire_bytes, &mut msg, &UnmarshalOptions::default()).unwrap();

    let protowire::FieldStorage::Map(entries) = msg.get(field.number).unwrap() else {
        panic!("expected a map");
    };
    match entries.get(&MapKey::I32(1)) {
        Some(Value::String(s)) => assert!(s.is_empty()),
        other => panic!("expected an empty string default, got {other:?}"),
    }
}

#[test]
fn deterministic_mode_sorts_map_entries_by_key() {
    let (descriptor, field) = map_descriptor();
    let mut msg = DynamicMessage::new(descriptor);
    msg.mutable_map(field.number).insert(MapKey::I32(3), Value::String("c".into()));
    msg.mutable_map(field.number).insert(MapKey::I32(1), Value::String("a".into()));
    msg.mutable_map(field.number).insert(MapKey::I32(2), Value::String("b".into()));

    let options = MarshalOptions {
        deterministic: true,
        ..Default::default()
    };
    let (bytes, _) = protowire::marshal(&msg, &options).unwrap();

    let mut decoded = DynamicMessage::new(msg.descriptor().clone());
    protowire::unmarshal(&bytes, &mut decoded, &UnmarshalOptions::default()).unwrap();
    assert!(protowire::ops::equal::equal(&msg, &decoded).unwrap());

    // Entries appear key-ascending: 1, 2, 3.
    let first_entry_start = 0usize;
    assert_eq!(bytes[first_entry_start], 0x3A);
    // key varint for entry 1 is byte 3 of the first record (tag, len, tag, value).
    assert_eq!(bytes[first_entry_start + 3], 0x01);
}

#[test]
fn map_with_message_values_merges_recursively() {
    let inner_field = common::scalar(1, "x", Kind::Int32, Cardinality::SingularProto3, Syntax::Proto3);
    let inner = common::message("test.MapInner", vec![inner_field.clone()], Syntax::Proto3);
    let value_field = common::message_field(2, "value", Cardinality::SingularProto3, inner.clone(), Syntax::Proto3);
    let entry = protowire::MessageDescriptor::map_entry(Kind::String, value_field, Syntax::Proto3);
    let map_field = common::message_field(1, "m", Cardinality::Repeated, entry, Syntax::Proto3);
    let descriptor = common::message("test.MapMsgVal", vec![map_field.clone()], Syntax::Proto3);

    let mut msg = DynamicMessage::new(descriptor);
    let mut inner_msg = DynamicMessage::new(inner);
    inner_msg.set_singular(&inner_field, Value::I32(5));
    msg.mutable_map(map_field.number)
        .insert(MapKey::String("k".into()), Value::Message(Box::new(inner_msg)));

    let protowire::FieldStorage::Map(entries) = msg.get(map_field.number).unwrap() else {
        panic!("expected a map");
    };
    let Value::Message(stored) = entries.get(&MapKey::String("k".into())).unwrap() else {
        panic!("expected a message value");
    };
    assert_eq!(stored.get(1).unwrap().clone().must_i32(), 5);
}

trait MustI32 {
    fn must_i32(self) -> i32;
}

impl MustI32 for protowire::FieldStorage {
    fn must_i32(self) -> i32 {
        match self {
            protowire::FieldStorage::Singular(v) => v.as_i32().unwrap(),
            _ => panic!("not singular"),
        }
    }
}
