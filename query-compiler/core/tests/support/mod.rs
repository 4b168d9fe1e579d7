//! Shared fixtures: an in-memory blog schema and compiler builders.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use sqlgraph_core::config::{Config, OpPolicy, Role, RoleTable};
use sqlgraph_core::Compiler;
use sqlgraph_schema::{ColumnSpec, DbFuncParam, DbFunction, DbSchema, DbTable, UnionDef};

pub fn blog_schema(db_type: &str) -> Arc<DbSchema> {
    let mut s = DbSchema::new(db_type);

    s.add_table(
        DbTable::new("public", "users")
            .with_column(ColumnSpec::new("id", "bigint").primary().build())
            .with_column(ColumnSpec::new("name", "text").build())
            .with_column(ColumnSpec::new("email", "text").build()),
    );
    s.add_table(
        DbTable::new("public", "posts")
            .with_column(ColumnSpec::new("id", "bigint").primary().build())
            .with_column(ColumnSpec::new("title", "text").build())
            .with_column(ColumnSpec::new("body", "text").build())
            .with_column(ColumnSpec::new("tsv", "tsvector").full_text().build())
            .with_column(
                ColumnSpec::new("user_id", "bigint")
                    .references("users", "id")
                    .build(),
            ),
    );
    s.add_table(
        DbTable::new("public", "comments")
            .with_column(ColumnSpec::new("id", "bigint").primary().build())
            .with_column(ColumnSpec::new("body", "text").build())
            .with_column(
                ColumnSpec::new("post_id", "bigint")
                    .references("posts", "id")
                    .build(),
            ),
    );
    s.add_table(
        DbTable::new("public", "tags")
            .with_column(ColumnSpec::new("id", "bigint").primary().build())
            .with_column(ColumnSpec::new("name", "text").build()),
    );
    s.add_table(
        DbTable::new("public", "post_tags")
            .with_column(
                ColumnSpec::new("post_id", "bigint")
                    .references("posts", "id")
                    .build(),
            )
            .with_column(
                ColumnSpec::new("tag_id", "bigint")
                    .references("tags", "id")
                    .build(),
            ),
    );
    s.add_table(
        DbTable::new("public", "reply")
            .with_column(ColumnSpec::new("id", "bigint").primary().build())
            .with_column(ColumnSpec::new("body", "text").build())
            .with_column(
                ColumnSpec::new("parent_id", "bigint")
                    .references("reply", "id")
                    .build(),
            ),
    );
    s.add_alias("thread", "reply");

    s.add_table(
        DbTable::new("public", "notifications")
            .with_column(ColumnSpec::new("id", "bigint").primary().build())
            .with_column(ColumnSpec::new("verb", "text").build())
            .with_column(ColumnSpec::new("subject_id", "bigint").build())
            .with_column(ColumnSpec::new("subject_type", "text").build()),
    );
    s.add_union(
        "notifications",
        "subject",
        UnionDef {
            id_col: "subject_id".into(),
            type_col: "subject_type".into(),
            ref_col: "id".into(),
            members: vec!["posts".into(), "comments".into()],
        },
    );

    let mut blocked = DbTable::new("public", "audit_log")
        .with_column(ColumnSpec::new("id", "bigint").primary().build());
    blocked.blocked = true;
    s.add_table(blocked);

    s.add_table(DbTable::function(
        "public",
        DbFunction {
            schema: "public".into(),
            name: "search_posts".into(),
            return_type: "posts".into(),
            inputs: vec![
                DbFuncParam {
                    name: "query".into(),
                    param_type: "text".into(),
                },
                DbFuncParam {
                    name: "rank".into(),
                    param_type: "float".into(),
                },
            ],
        },
    ));

    s.add_remote("users", "payments");

    Arc::new(s)
}

pub fn schema() -> Arc<DbSchema> {
    blog_schema("postgres")
}

pub fn compiler() -> Compiler {
    Compiler::new(schema(), Config::default())
}

pub fn compiler_with(conf: Config) -> Compiler {
    Compiler::new(schema(), conf)
}

pub fn mysql_compiler() -> Compiler {
    Compiler::new(blog_schema("mysql"), Config::default())
}

/// A config where `user` sees their own posts and `anon` is locked down.
pub fn role_config() -> Config {
    Config {
        roles: vec![
            Role {
                name: "user".into(),
                tables: vec![RoleTable {
                    name: "posts".into(),
                    query: Some(OpPolicy {
                        filters: vec![json!({ "user_id": { "eq": "$user_id" } })],
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
            },
            Role {
                name: "anon".into(),
                tables: vec![RoleTable {
                    name: "users".into(),
                    query: Some(OpPolicy {
                        block: true,
                        ..Default::default()
                    }),
                    insert: Some(OpPolicy {
                        block: true,
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
            },
        ],
        ..Default::default()
    }
}
