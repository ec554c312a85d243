mod common;

use protowire::{DynamicMessage, MarshalOptions, UnmarshalOptions};

#[test]
fn unknown_field_round_trips_through_marshal() {
    let descriptor = common::message("test.Empty", Vec::new(), protowire::Syntax::Proto3);
    let wire_bytes = [0x08, 0x01]; // field 1, varint 1 — not in the descriptor
    let mut msg = DynamicMessage::new(descriptor);
    protowire::unmarshal(&wire_bytes, &mut msg, &UnmarshalOptions::default()).unwrap();
    assert!(!msg.unknown_fields().is_empty());

    let (bytes, _) = protowire::marshal(&msg, &MarshalOptions::default()).unwrap();
    assert_eq!(&bytes[..], &wire_bytes[..]);
}

#[test]
fn discard_unknown_drops_the_bytes() {
    let descriptor = common::message("test.Empty2", Vec::new(), protowire::Syntax::Proto3);
    let wire_bytes = [0x08, 0x01];
    let mut msg = DynamicMessage::new(descriptor);
    let options = UnmarshalOptions {
        discard_unknown: true,
        ..Default::default()
    };
    protowire::unmarshal(&wire_bytes, &mut msg, &options).unwrap();
    assert!(msg.unknown_fields().is_empty());
}

#[test]
fn unknown_fields_compare_equal_regardless_of_number_order() {
    let descriptor = common::message("test.Empty3", Vec::new(), protowire::Syntax::Proto3);
    let mut a = DynamicMessage::new(descriptor.clone());
    let mut b = DynamicMessage::new(descriptor);
    // Field 5 before field 1 in `a`, reversed in `b`.
    protowire::unmarshal(&[0x28, 0x01, 0x08, 0x02], &mut a, &UnmarshalOptions::default()).unwrap();
    protowire::unmarshal(&[0x08, 0x02, 0x28, 0x01], &mut b, &UnmarshalOptions::default()).unwrap();
    assert!(protowire::ops::equal::equal(&a, &b).unwrap());
}
