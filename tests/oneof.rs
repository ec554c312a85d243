mod common;

use protowire::{Cardinality, DynamicMessage, Kind, Syntax, Value};

#[test]
fn setting_one_oneof_member_clears_the_sibling() {
    let a = common::oneof_member(
        common::scalar(1, "a", Kind::Int32, Cardinality::Optional, Syntax::Proto3),
        0,
    );
    let b = common::oneof_member(
        common::scalar(2, "b", Kind::String, Cardinality::Optional, Syntax::Proto3),
        0,
    );
    let descriptor = common::message("test.Oneof", vec![a.clone(), b.clone()], Syntax::Proto3);
    let mut msg = DynamicMessage::new(descriptor);

    msg.set_singular(&a, Value::I32(1));
    assert!(msg.has(1));
    msg.set_singular(&b, Value::String("x".into()));
    assert!(!msg.has(1));
    assert!(msg.has(2));
}

#[test]
fn oneof_member_explicitly_set_to_its_zero_value_still_reports_as_set() {
    let a = common::oneof_member(
        common::scalar(1, "a", Kind::Int32, Cardinality::Optional, Syntax::Proto3),
        0,
    );
    let descriptor = common::message("test.OneofZero", vec![a.clone()], Syntax::Proto3);
    let mut msg = DynamicMessage::new(descriptor);

    assert_eq!(msg.oneof_case(0), None);
    assert!(!msg.has(1));

    msg.set_singular(&a, Value::I32(0));
    assert!(msg.has(1));
    assert_eq!(msg.oneof_case(0), Some(1));
}

#[test]
fn resetting_the_same_oneof_message_member_merges_instead_of_replacing() {
    let inner = {
        let field = common::scalar(1, "a", Kind::Int32, Cardinality::SingularProto3, Syntax::Proto3);
        common::message("test.OneofInner", vec![field], Syntax::Proto3)
    };
    let inner_a_field = inner.field_by_number(1).unwrap().clone();
    let m = common::oneof_member(
        common::message_field(1, "m", Cardinality::Optional, inner, Syntax::Proto3),
        0,
    );
    let descriptor = common::message("test.OneofMsg", vec![m.clone()], Syntax::Proto3);
    let mut msg = DynamicMessage::new(descriptor);

    msg.mutable_message(&m).set_singular(&inner_a_field, Value::I32(1));
    msg.mutable_message(&m); // same oneof case again: must merge, not reset
    let protowire::FieldStorage::Singular(Value::Message(sub)) = msg.get(1).unwrap() else {
        panic!("expected a message");
    };
    assert!(sub.has(1));
}
