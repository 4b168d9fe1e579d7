mod support;

use pretty_assertions::assert_eq;
use serde_json::json;
use sqlgraph_core::config::{Config, OpPolicy, Role, RoleTable};
use sqlgraph_core::graph::{Arg, Node, Operation};
use sqlgraph_core::qcode::{ExpOp, SkipType, ValType};

fn posts_query() -> Operation {
    let mut op = Operation::query("q");
    let posts = op.push_field(-1, "posts");
    op.push_field(posts, "id");
    op
}

#[test]
fn role_filter_template_merges_into_where() {
    let qc = support::compiler_with(support::role_config())
        .compile(&posts_query(), Default::default(), "user")
        .unwrap();
    let root = qc.selects[0].filter.root().unwrap();

    assert_eq!(root.op, ExpOp::Eq);
    assert_eq!(root.left.col.name, "user_id");
    assert_eq!(root.right.val_type, Some(ValType::Var));
    assert_eq!(root.right.val, "user_id");
    assert_eq!(qc.selects[0].skip_render, SkipType::None);
}

#[test]
fn user_filter_and_template_conjoin() {
    let mut op = Operation::query("q");
    let posts = op.push_field(-1, "posts");
    op.field_mut(posts).args.push(Arg::new(
        "where",
        Node::obj([("title", Node::obj([("eq", Node::str("x"))]))]),
    ));
    op.push_field(posts, "id");

    let qc = support::compiler_with(support::role_config())
        .compile(&op, Default::default(), "user")
        .unwrap();
    let root = qc.selects[0].filter.root().unwrap();

    // The template wraps around the user filter, never the other way.
    assert_eq!(root.op, ExpOp::And);
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].right.val, "user_id");
    assert_eq!(root.children[1].left.col.name, "title");
}

#[test]
fn anonymous_caller_with_user_filter_is_render_skipped() {
    let conf = Config {
        roles: vec![Role {
            name: "anon".into(),
            tables: vec![RoleTable {
                name: "posts".into(),
                query: Some(OpPolicy {
                    filters: vec![json!({ "user_id": { "eq": "$user_id" } })],
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }],
        ..Default::default()
    };

    let qc = support::compiler_with(conf)
        .compile(&posts_query(), Default::default(), "anon")
        .unwrap();
    assert_eq!(qc.selects[0].skip_render, SkipType::UserNeeded);
}

#[test]
fn blocked_query_demotes_to_render_skip() {
    let mut op = Operation::query("q");
    let users = op.push_field(-1, "users");
    op.push_field(users, "id");

    let qc = support::compiler_with(support::role_config())
        .compile(&op, Default::default(), "anon")
        .unwrap();
    assert_eq!(qc.selects[0].skip_render, SkipType::Blocked);
}

#[test]
fn false_template_forces_no_rows() {
    let conf = Config {
        roles: vec![Role {
            name: "anon".into(),
            tables: vec![RoleTable {
                name: "posts".into(),
                query: Some(OpPolicy {
                    filters: vec![json!("false")],
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }],
        ..Default::default()
    };

    let qc = support::compiler_with(conf)
        .compile(&posts_query(), Default::default(), "anon")
        .unwrap();
    assert_eq!(qc.selects[0].filter.root().unwrap().op, ExpOp::False);
}

#[test]
fn role_limit_beats_the_default() {
    let conf = Config {
        roles: vec![Role {
            name: "user".into(),
            tables: vec![RoleTable {
                name: "posts".into(),
                query: Some(OpPolicy {
                    limit: 5,
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }],
        default_limit: 50,
        ..Default::default()
    };

    let qc = support::compiler_with(conf)
        .compile(&posts_query(), Default::default(), "user")
        .unwrap();
    assert_eq!(qc.selects[0].paging.limit, 5);
}

#[test]
fn default_limit_applies_without_a_role_limit() {
    let conf = Config {
        default_limit: 50,
        ..Default::default()
    };
    let qc = support::compiler_with(conf)
        .compile(&posts_query(), Default::default(), "user")
        .unwrap();
    assert_eq!(qc.selects[0].paging.limit, 50);
}

#[test]
fn default_block_locks_unlisted_tables() {
    let conf = Config {
        default_block: true,
        ..Default::default()
    };
    let qc = support::compiler_with(conf)
        .compile(&posts_query(), Default::default(), "user")
        .unwrap();
    assert_eq!(qc.selects[0].skip_render, SkipType::Blocked);
}

#[test]
fn shared_templates_never_alias_mutable_state() {
    let conf = Config {
        roles: vec![Role {
            name: "user".into(),
            tables: vec![RoleTable {
                name: "posts".into(),
                query: Some(OpPolicy {
                    // Two templates so the compiled root is an `and` node.
                    filters: vec![
                        json!({ "user_id": { "eq": "$user_id" } }),
                        json!({ "title": { "is_null": false } }),
                    ],
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }],
        ..Default::default()
    };
    let co = support::compiler_with(conf);

    // First compilation appends a cursor seek predicate onto the shared
    // template root.
    let mut cursor_op = Operation::query("q");
    let posts = cursor_op.push_field(-1, "posts");
    cursor_op
        .field_mut(posts)
        .args
        .push(Arg::new("first", Node::num("2")));
    cursor_op
        .field_mut(posts)
        .args
        .push(Arg::new("after", Node::var("cursor")));
    cursor_op.push_field(posts, "id");

    let qc1 = co.compile(&cursor_op, Default::default(), "user").unwrap();
    let root1 = qc1.selects[0].filter.root().unwrap();
    assert_eq!(root1.op, ExpOp::And);
    assert_eq!(root1.children.len(), 3);

    // A later plain compilation sees the template untouched.
    let qc2 = co.compile(&posts_query(), Default::default(), "user").unwrap();
    let root2 = qc2.selects[0].filter.root().unwrap();
    assert_eq!(root2.op, ExpOp::And);
    assert_eq!(root2.children.len(), 2);
}
