mod support;

use pretty_assertions::assert_eq;
use sqlgraph_core::graph::{Arg, Node, Operation};
use sqlgraph_core::qcode::QType;

#[test]
fn insert_records_the_action_variable() {
    let mut op = Operation::mutation("createUser");
    let users = op.push_field(-1, "users");
    op.field_mut(users)
        .args
        .push(Arg::new("insert", Node::var("u")));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();

    assert_eq!(qc.qtype, QType::Mutation);
    assert_eq!(qc.stype, QType::Insert);
    assert_eq!(qc.action_var, "u");
    assert_eq!(qc.action_arg.as_ref().unwrap().name, "insert");
}

#[test]
fn update_accepts_an_inline_object() {
    let mut op = Operation::mutation("m");
    let users = op.push_field(-1, "users");
    op.field_mut(users).args.push(Arg::new(
        "update",
        Node::obj([("name", Node::str("new name"))]),
    ));
    op.field_mut(users).args.push(Arg::new("id", Node::num("1")));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.stype, QType::Update);
}

#[test]
fn upsert_accepts_a_list_of_objects() {
    let mut op = Operation::mutation("m");
    let users = op.push_field(-1, "users");
    op.field_mut(users).args.push(Arg::new(
        "upsert",
        Node::list([Node::obj([("name", Node::str("a"))])]),
    ));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.stype, QType::Upsert);
}

#[test]
fn action_list_must_hold_objects() {
    let mut op = Operation::mutation("m");
    let users = op.push_field(-1, "users");
    op.field_mut(users).args.push(Arg::new(
        "insert",
        Node::list([Node::num("1"), Node::num("2")]),
    ));
    op.push_field(users, "id");

    let err = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "value for argument 'insert' must be a variable, an object or a list of objects"
    );
}

#[test]
fn empty_action_list_is_an_error() {
    let mut op = Operation::mutation("m");
    let users = op.push_field(-1, "users");
    op.field_mut(users)
        .args
        .push(Arg::new("insert", Node::list([])));
    op.push_field(users, "id");

    assert!(support::compiler()
        .compile(&op, Default::default(), "user")
        .is_err());
}

#[test]
fn delete_requires_the_literal_true() {
    let mut op = Operation::mutation("m");
    let users = op.push_field(-1, "users");
    op.field_mut(users)
        .args
        .push(Arg::new("delete", Node::bool(true)));
    op.field_mut(users).args.push(Arg::new("id", Node::num("1")));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.stype, QType::Delete);

    let mut bad = Operation::mutation("m");
    let users = bad.push_field(-1, "users");
    bad.field_mut(users)
        .args
        .push(Arg::new("delete", Node::bool(false)));
    bad.push_field(users, "id");

    let err = support::compiler()
        .compile(&bad, Default::default(), "user")
        .unwrap_err();
    assert_eq!(err.to_string(), "value for 'delete' must be 'true'");
}

#[test]
fn mutation_without_an_action_is_an_error() {
    let mut op = Operation::mutation("m");
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");

    let err = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "mutations must contains one of the following arguments (insert, update, upsert or delete)"
    );
}

#[test]
fn role_blocked_mutation_fails_compilation() {
    let mut op = Operation::mutation("m");
    let users = op.push_field(-1, "users");
    op.field_mut(users)
        .args
        .push(Arg::new("insert", Node::var("u")));
    op.push_field(users, "id");

    let err = support::compiler_with(support::role_config())
        .compile(&op, Default::default(), "anon")
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("insert blocked"), "got: {msg}");
    assert!(msg.contains("anon"), "got: {msg}");
    assert_eq!(msg, "insert blocked: users (role: anon)");
}
