mod support;

use pretty_assertions::assert_eq;
use sqlgraph_core::graph::{Arg, Directive, Node, Operation};
use sqlgraph_core::qcode::{ExpOp, SkipType, ValType};

#[test]
fn object_forces_a_single_row() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.field_mut(users)
        .directives
        .push(Directive::new("object", []));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert!(qc.selects[0].singular);
    assert_eq!(qc.selects[0].paging.limit, 1);
}

#[test]
fn skip_if_role_drops_the_selector() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.field_mut(users).directives.push(Directive::new(
        "skip",
        [Arg::new("if_role", Node::str("user"))],
    ));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.selects[0].skip_render, SkipType::Drop);

    // A different role keeps it.
    let qc = support::compiler()
        .compile(&op, Default::default(), "admin")
        .unwrap();
    assert_eq!(qc.selects[0].skip_render, SkipType::None);
}

#[test]
fn include_if_role_drops_everyone_else() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.field_mut(users).directives.push(Directive::new(
        "include",
        [Arg::new("if_role", Node::str("admin"))],
    ));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.selects[0].skip_render, SkipType::Drop);
}

#[test]
fn skip_if_variable_folds_into_the_filter() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.field_mut(users)
        .directives
        .push(Directive::new("skip", [Arg::new("if", Node::var("hide"))]));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    let root = qc.selects[0].filter.root().unwrap();

    assert_eq!(root.op, ExpOp::NotEqTrue);
    assert_eq!(root.right.val_type, Some(ValType::Var));
    assert_eq!(root.right.val, "hide");
}

#[test]
fn skip_if_filter_object_is_negated() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.field_mut(users).directives.push(Directive::new(
        "skip",
        [Arg::new(
            "if",
            Node::obj([("name", Node::obj([("eq", Node::str("root"))]))]),
        )],
    ));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    let root = qc.selects[0].filter.root().unwrap();

    assert_eq!(root.op, ExpOp::Not);
    assert_eq!(root.children[0].op, ExpOp::Eq);
    assert_eq!(root.children[0].left.col.name, "name");
}

#[test]
fn field_level_skip_drops_the_field() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");
    let name = op.push_field(users, "name");
    op.field_mut(name).directives.push(Directive::new(
        "skip",
        [Arg::new("if_role", Node::str("user"))],
    ));

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    let sel = &qc.selects[0];

    assert_eq!(sel.fields[0].skip_render, SkipType::None);
    assert_eq!(sel.fields[1].skip_render, SkipType::Drop);
}

#[test]
fn skip_without_arguments_is_an_error() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.field_mut(users)
        .directives
        .push(Directive::new("skip", []));
    op.push_field(users, "id");

    let err = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "directive @skip: arguments 'if' or 'if_role' expected"
    );
}

#[test]
fn unknown_selector_directive_is_an_error() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.field_mut(users)
        .directives
        .push(Directive::new("sparkle", []));
    op.push_field(users, "id");

    let err = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "directive @sparkle: no such selector level directive"
    );
}

#[test]
fn unknown_operation_directive_is_an_error() {
    let mut op = Operation::query("q");
    op.directives.push(Directive::new("turbo", []));
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");

    let err = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown operation level directive: turbo");
}

#[test]
fn cache_control_composes_a_header() {
    let mut op = Operation::query("q");
    op.directives.push(Directive::new(
        "cacheControl",
        [
            Arg::new("maxAge", Node::num("120")),
            Arg::new("scope", Node::str("public")),
        ],
    ));
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.cache.header, "max-age=120 public");
}

#[test]
fn cache_control_requires_max_age() {
    let mut op = Operation::query("q");
    op.directives.push(Directive::new(
        "cacheControl",
        [Arg::new("scope", Node::str("public"))],
    ));
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");

    let err = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap_err();
    assert_eq!(err.to_string(), "required argument 'maxAge' missing");
}

#[test]
fn script_names_default_and_gain_an_extension() {
    let mut op = Operation::query("onboard");
    op.directives.push(Directive::new(
        "script",
        [Arg::new("name", Node::str("welcome"))],
    ));
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.script.name, "welcome.js");
    assert!(qc.script.exists());
}

#[test]
fn validation_requires_source_and_type() {
    let mut op = Operation::query("q");
    op.directives.push(Directive::new(
        "validation",
        [Arg::new("src", Node::str("checks.ts"))],
    ));
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");

    let err = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap_err();
    assert_eq!(err.to_string(), "validation type not set");
}

#[test]
fn constraint_directive_packs_into_consts() {
    let mut op = Operation::query("Q");
    op.directives.push(Directive::new(
        "constraint",
        [
            Arg::new("variable", Node::str("name")),
            Arg::new("required", Node::bool(true)),
            Arg::new("min", Node::num("3")),
            Arg::new("max", Node::num("50")),
            Arg::new("format", Node::str("email")),
            Arg::new("error", Node::str("bad email")),
        ],
    ));
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.consts["name"], "required,min=3,max=50,email~bad email");
}

#[test]
fn schema_directive_overrides_the_lookup_schema() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.field_mut(users).directives.push(Directive::new(
        "schema",
        [Arg::new("name", Node::str("public"))],
    ));
    op.push_field(users, "id");

    let qc = support::compiler()
        .compile(&op, Default::default(), "user")
        .unwrap();
    assert_eq!(qc.selects[0].ti.schema, "public");
}

#[test]
fn through_disambiguates_the_join_path() {
    use sqlgraph_schema::{ColumnSpec, DbSchema, DbTable};
    use std::sync::Arc;

    let mut s = DbSchema::new("postgres");
    s.add_table(
        DbTable::new("public", "users")
            .with_column(ColumnSpec::new("id", "bigint").primary().build()),
    );
    s.add_table(
        DbTable::new("public", "products")
            .with_column(ColumnSpec::new("id", "bigint").primary().build())
            .with_column(
                ColumnSpec::new("created_by", "bigint")
                    .references("users", "id")
                    .build(),
            )
            .with_column(
                ColumnSpec::new("updated_by", "bigint")
                    .references("users", "id")
                    .build(),
            ),
    );
    let co = sqlgraph_core::Compiler::new(Arc::new(s), Default::default());

    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");
    let products = op.push_field(users, "products");
    op.field_mut(products).directives.push(Directive::new(
        "through",
        [Arg::new("column", Node::str("created_by"))],
    ));
    op.push_field(products, "id");

    let qc = co.compile(&op, Default::default(), "user").unwrap();
    let root = qc.selects[1].filter.root().unwrap();
    assert_eq!(root.left.col.name, "created_by");

    // Without @through the two candidate keys are ambiguous.
    op.field_mut(products).directives.clear();
    let err = co.compile(&op, Default::default(), "user").unwrap_err();
    assert_eq!(
        err.to_string(),
        "multiple relationship paths found between 'products' and 'users', specify one with @through"
    );
}
