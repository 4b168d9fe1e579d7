//! The expression IR: tagged nodes whose every column leaf is anchored to a
//! concrete schema column, plus the filter combinator that merges
//! authorization, relationship, cursor and user filters.

use std::sync::Arc;

use sqlgraph_schema::{DbColumn, DbRel};

/// The closed operator set. Arity and right-operand kind are fixed per
/// operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpOp {
    #[default]
    Nop,
    And,
    Or,
    Not,
    Eq,
    NotEq,
    GtEq,
    LtEq,
    Gt,
    Lt,
    In,
    NotIn,
    Like,
    NotLike,
    ILike,
    NotILike,
    Similar,
    NotSimilar,
    Regex,
    NotRegex,
    IRegex,
    NotIRegex,
    Contains,
    ContainedIn,
    HasInCommon,
    HasKey,
    HasKeyAny,
    HasKeyAll,
    IsNull,
    IsNotNull,
    TsQuery,
    /// Forces the query to return no rows.
    False,
    NotDistinct,
    Distinct,
    EqTrue,
    NotEqTrue,
    SelectExists,
}

impl ExpOp {
    pub fn is_bool(self) -> bool {
        matches!(self, ExpOp::And | ExpOp::Or | ExpOp::Not)
    }
}

/// Kind tag for literal right operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    Str,
    Num,
    Bool,
    List,
    Obj,
    Var,
}

/// Left operand: always a column, optionally re-anchored to another
/// selector (`sel_id`) or to a sentinel table such as `__cur` or
/// `__rcte_<table>`.
#[derive(Debug, Clone, PartialEq)]
pub struct LeftOperand {
    pub sel_id: i32,
    pub table: String,
    pub col: DbColumn,
}

impl Default for LeftOperand {
    fn default() -> Self {
        LeftOperand {
            sel_id: -1,
            table: String::new(),
            col: DbColumn::default(),
        }
    }
}

/// Right operand: a column reference, a typed literal, a list literal, or a
/// variable (optionally with a path into its composite value).
#[derive(Debug, Clone, PartialEq)]
pub struct RightOperand {
    pub sel_id: i32,
    pub table: String,
    pub col: DbColumn,
    pub val_type: Option<ValType>,
    pub val: String,
    pub list_type: Option<ValType>,
    pub list: Vec<String>,
    pub path: Vec<String>,
}

impl Default for RightOperand {
    fn default() -> Self {
        RightOperand {
            sel_id: -1,
            table: String::new(),
            col: DbColumn::default(),
            val_type: None,
            val: String::new(),
            list_type: None,
            list: Vec::new(),
            path: Vec::new(),
        }
    }
}

/// One expression node. Boolean operators carry children; `joins` holds the
/// join chain a nested relation filter rides in on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exp {
    pub op: ExpOp,
    pub left: LeftOperand,
    pub right: RightOperand,
    pub children: Vec<Arc<Exp>>,
    pub joins: Vec<Join>,
}

impl Exp {
    pub fn new(op: ExpOp) -> Self {
        Exp {
            op,
            ..Default::default()
        }
    }

    pub fn push_child(&mut self, child: Exp) {
        self.children.push(Arc::new(child));
    }
}

/// A join edge plus the filter binding its two sides. `local` joins were
/// introduced by an `order_by` over a related table rather than by the
/// selection tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Join {
    pub rel: DbRel,
    pub filter: Option<Arc<Exp>>,
    pub local: bool,
}

/// The root of a selector's `where` tree.
///
/// Role filter templates are compiled once and shared between compilations
/// as `Arc<Exp>`; the merge rule below never mutates a node that may be
/// shared — appending to a shared boolean root goes through
/// `Arc::make_mut`, which copies the wrapper first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    root: Option<Arc<Exp>>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<&Arc<Exp>> {
        self.root.as_ref()
    }

    pub fn take(&mut self) -> Option<Arc<Exp>> {
        self.root.take()
    }

    /// Replaces the tree outright (used by `id` and `false` templates).
    pub fn replace(&mut self, ex: Arc<Exp>) {
        self.root = Some(ex);
    }

    pub fn set(&mut self, ex: Exp) {
        self.set_shared(Arc::new(ex));
    }

    /// Merges `ex` into the tree:
    /// 1. an empty filter adopts `ex` as its root;
    /// 2. a non-boolean root is wrapped in a fresh `and` with `[ex, root]`;
    /// 3. a boolean root gains `ex` as an extra child.
    pub fn set_shared(&mut self, ex: Arc<Exp>) {
        match self.root.take() {
            None => self.root = Some(ex),
            Some(root) if !root.op.is_bool() => {
                let mut and = Exp::new(ExpOp::And);
                and.children = vec![ex, root];
                self.root = Some(Arc::new(and));
            }
            Some(mut root) => {
                Arc::make_mut(&mut root).children.push(ex);
                self.root = Some(root);
            }
        }
    }
}
