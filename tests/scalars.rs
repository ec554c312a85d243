mod common;

use protowire::{Cardinality, Kind, MarshalOptions, Syntax, UnmarshalOptions, Value};

#[test]
fn basic_varint_matches_spec_example() {
    let field = common::scalar(1, "x", Kind::Int32, Cardinality::SingularProto3, Syntax::Proto3);
    let descriptor = common::message("test.Basic", vec![field.clone()], Syntax::Proto3);
    let mut msg = protowire::DynamicMessage::new(descriptor);
    msg.set_singular(&field, Value::I32(150));

    let (bytes, non_fatal) = protowire::marshal(&msg, &MarshalOptions::default()).unwrap();
    assert!(non_fatal.is_none());
    assert_eq!(&bytes[..], &[0x08, 0x96, 0x01]);

    let mut decoded = protowire::DynamicMessage::new(msg.descriptor().clone());
    protowire::unmarshal(&bytes, &mut decoded, &UnmarshalOptions::default()).unwrap();
    assert_eq!(decoded.get(1).unwrap().clone().as_singular_i32(), 150);
}

#[test]
fn negative_int32_sign_extends_to_ten_byte_varint() {
    let field = common::scalar(1, "x", Kind::Int32, Cardinality::SingularProto3, Syntax::Proto3);
    let descriptor = common::message("test.Neg", vec![field.clone()], Syntax::Proto3);
    let mut msg = protowire::DynamicMessage::new(descriptor);
    msg.set_singular(&field, Value::I32(-1));

    let (bytes, _) = protowire::marshal(&msg, &MarshalOptions::default()).unwrap();
    assert_eq!(bytes.len(), 1 + 10);
}

#[test]
fn invalid_utf8_is_surfaced_as_non_fatal_but_still_populated() {
    let field = common::scalar(1, "s", Kind::String, Cardinality::SingularProto3, Syntax::Proto3);
    let descriptor = common::message("test.Str", vec![field], Syntax::Proto3);
    let mut wire = vec![0x0A, 0x02];
    wire.extend_from_slice(&[0xFF, 0xFE]);

    let mut msg = protowire::DynamicMessage::new(descriptor);
    let non_fatal = protowire::unmarshal(&wire, &mut msg, &UnmarshalOptions::default()).unwrap();
    assert!(matches!(non_fatal, Some(protowire::NonFatal::InvalidUtf8(_))));
    assert!(msg.has(1));
}

#[test]
fn size_matches_marshal_length_for_mixed_scalars() {
    let fields = vec![
        common::scalar(1, "a", Kind::Int32, Cardinality::SingularProto3, Syntax::Proto3),
        common::scalar(2, "b", Kind::String, Cardinality::SingularProto3, Syntax::Proto3),
        common::scalar(3, "c", Kind::Double, Cardinality::SingularProto3, Syntax::Proto3),
    ];
    let descriptor = common::message("test.Mixed", fields.clone(), Syntax::Proto3);
    let mut msg = protowire::DynamicMessage::new(descriptor);
    msg.set_singular(&fields[0], Value::I32(42));
    msg.set_singular(&fields[1], Value::String("hello world".into()));
    msg.set_singular(&fields[2], Value::F64(3.5));

    let options = MarshalOptions::default();
    let computed = protowire::size(&msg, &options);
    let (bytes, _) = protowire::marshal(&msg, &options).unwrap();
    assert_eq!(computed, bytes.len());
}

trait SingularI32 {
    fn as_singular_i32(self) -> i32;
}

impl SingularI32 for protowire::FieldStorage {
    fn as_singular_i32(self) -> i32 {
        match self {
            protowire::FieldStorage::Singular(v) => v.as_i32().unwrap(),
            _ => panic!("not singular"),
        }
    }
}
