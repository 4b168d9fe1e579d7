//! The query-compiler core of a GraphQL-to-SQL engine.
//!
//! Takes a parsed GraphQL operation, a database schema, a caller role and a
//! variable environment, and produces a fully resolved, validated
//! intermediate representation ([`QCode`]) from which a SQL generator emits
//! a single parameterised statement.
//!
//! The compiler resolves identifier names against the relational schema,
//! infers the relationship path joining each nested selection to its parent
//! (polymorphic and recursive relations included), materialises cursor
//! pagination as lexicographic seek predicates, merges role-based
//! authorization filters into user-written `where` trees, and compiles
//! declarative constraint directives.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sqlgraph_core::{graph, Compiler, Config};
//! use sqlgraph_schema::DbSchema;
//!
//! # fn demo(schema: Arc<DbSchema>, op: graph::Operation) -> sqlgraph_core::Result<()> {
//! let compiler = Compiler::new(schema, Config::default());
//! let qcode = compiler.compile(&op, Default::default(), "user")?;
//! # let _ = qcode; Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod qcode;

mod util;

pub use config::Config;
pub use error::{CompileError, Result};
pub use qcode::{Compiler, QCode};
