//! The compiler's output IR (QCode) and the passes that produce it.
//!
//! A compilation turns one parsed operation into a flat, topologically
//! ordered sequence of selectors, each anchored to a schema table and
//! carrying its filter, ordering, paging and join state.

mod args;
mod compile;
mod constraints;
mod directives;
mod expr;
mod fields;
mod mutation;
mod role;

pub use compile::{Compiler, MAX_SELECTORS};
pub use constraints::Constraints;
pub use expr::{Exp, ExpOp, Filter, Join, LeftOperand, RightOperand, ValType};

use std::collections::HashMap;
use std::fmt;

use serde_json::value::RawValue;
use sqlgraph_schema::{DbColumn, DbFunction, DbRel, DbTable};

use crate::config::TableCustom;
use crate::error::{CompileError, Result};
use crate::graph;

/// Raw JSON variable environment; values are typed only at point of use.
pub type Variables = HashMap<String, Box<RawValue>>;

/// Operation kinds. `stype` on a QCode refines a mutation into its action
/// kind; read operations keep `Query`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QType {
    #[default]
    Unknown,
    Query,
    Subscription,
    Mutation,
    Insert,
    Update,
    Delete,
    Upsert,
}

impl fmt::Display for QType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QType::Unknown => "unknown",
            QType::Query => "query",
            QType::Subscription => "subscription",
            QType::Mutation => "mutation",
            QType::Insert => "insert",
            QType::Update => "update",
            QType::Delete => "delete",
            QType::Upsert => "upsert",
        };
        f.write_str(s)
    }
}

impl From<graph::OpType> for QType {
    fn from(t: graph::OpType) -> Self {
        match t {
            graph::OpType::Query => QType::Query,
            graph::OpType::Mutation => QType::Mutation,
            graph::OpType::Subscription => QType::Subscription,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelType {
    #[default]
    None,
    Union,
    Member,
}

/// Why a selector or field is withheld from SQL generation. Not an error;
/// the downstream generator renders around it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipType {
    #[default]
    None,
    /// A directive elided it outright.
    Drop,
    /// The row filter needs an authenticated user and the caller is `anon`.
    UserNeeded,
    /// Role policy blocks reading this table.
    Blocked,
    /// Resolved by the remote-join pipeline.
    Remote,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    None,
    Asc,
    Desc,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl Order {
    /// Parses an order keyword as written in a query.
    pub fn parse(val: &str) -> Result<Order> {
        match val {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            "asc_nulls_first" => Ok(Order::AscNullsFirst),
            "desc_nulls_first" => Ok(Order::DescNullsFirst),
            "asc_nulls_last" => Ok(Order::AscNullsLast),
            "desc_nulls_last" => Ok(Order::DescNullsLast),
            _ => Err(CompileError::OrderValue),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Order::None => "",
            Order::Asc => "ASC",
            Order::Desc => "DESC",
            Order::AscNullsFirst => "ASC NULLS FIRST",
            Order::AscNullsLast => "ASC NULLS LAST",
            Order::DescNullsFirst => "DESC NULLS FIRST",
            Order::DescNullsLast => "DESC NULLS LAST",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBy {
    /// Variable selecting a preconfigured ordering, with the preset key it
    /// selects.
    pub key_var: String,
    pub key: String,
    pub col: DbColumn,
    /// Variable holding the sort values for value-list ordering.
    pub var: String,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PagingType {
    #[default]
    Offset,
    ForwardCursor,
    BackwardCursor,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paging {
    pub kind: PagingType,
    pub limit: i32,
    pub limit_var: String,
    pub offset: i32,
    pub offset_var: String,
    pub cursor: bool,
    pub no_limit: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArgType {
    #[default]
    Val,
    Var,
    Col,
}

/// A compiled selector or function argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arg {
    pub arg_type: ArgType,
    pub dtype: String,
    pub name: String,
    pub val: String,
    pub col: Option<DbColumn>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldKind {
    #[default]
    Col,
    Func,
}

/// One output field of a selector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    pub kind: FieldKind,
    pub col: DbColumn,
    pub func: Option<DbFunction>,
    pub field_name: String,
    pub filter: Filter,
    pub args: Vec<Arg>,
    pub skip_render: SkipType,
}

/// A base column carried for selectors that wrap their table in an inner
/// query (recursive CTEs).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub col: DbColumn,
    pub field_name: String,
}

/// An aggregate or database function invocation selected as a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Function {
    pub name: String,
    pub col: Option<DbColumn>,
    pub func: Option<DbFunction>,
    pub field_name: String,
    pub alias: String,
    pub args: Vec<Arg>,
    pub agg: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cache {
    pub header: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub name: String,
}

impl Script {
    pub fn exists(&self) -> bool {
        !self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub source: String,
    pub lang: String,
}

impl Validation {
    pub fn exists(&self) -> bool {
        !self.source.is_empty()
    }
}

/// One GraphQL field mapped to a table or table-function invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub id: i32,
    pub parent_id: i32,
    pub sel_type: SelType,
    pub singular: bool,
    pub typename: bool,
    pub table: String,
    pub schema: String,
    pub field_name: String,
    pub fields: Vec<Field>,
    pub base_cols: Vec<Column>,
    pub iargs: Vec<Arg>,
    pub args: Vec<Arg>,
    pub funcs: Vec<Function>,
    pub filter: Filter,
    pub order_by: Vec<OrderBy>,
    pub distinct_on: Vec<DbColumn>,
    pub group_cols: bool,
    pub paging: Paging,
    pub children: Vec<i32>,
    pub skip_render: SkipType,
    pub ti: DbTable,
    pub rel: DbRel,
    pub joins: Vec<Join>,

    pub(crate) order: Order,
    pub(crate) through: String,
    pub(crate) tc: Option<TableCustom>,
}

impl Select {
    pub(crate) fn add_iarg(&mut self, arg: Arg) {
        self.iargs.push(arg);
    }

    pub fn internal_arg(&self, name: &str) -> Option<&Arg> {
        self.iargs.iter().find(|a| a.name == name)
    }
}

/// The root compilation artifact handed to the SQL generator.
#[derive(Debug, Default)]
pub struct QCode {
    pub qtype: QType,
    pub stype: QType,
    pub name: String,
    pub action_var: String,
    pub action_arg: Option<graph::Arg>,
    pub selects: Vec<Select>,
    pub roots: Vec<i32>,
    pub vars: Variables,
    pub consts: Constraints,
    pub remotes: i32,
    pub cache: Cache,
    pub script: Script,
    pub validation: Validation,
    pub typename: bool,
}
