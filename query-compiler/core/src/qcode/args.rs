//! Selector argument compilers: `id`, `search`, `where`, `orderby`,
//! `distinct_on`, paging arguments, `find` and function arguments.

use std::collections::HashSet;
use std::sync::Arc;

use sqlgraph_schema::{rel_from_path, DbTable};

use crate::error::{CompileError, Result};
use crate::graph::{self, Node, NodeType};
use crate::qcode::compile::{build_filter, Compiler, ANON_ROLE};
use crate::qcode::{
    Arg, ArgType, Exp, ExpOp, Join, Order, OrderBy, PagingType, Select, SkipType, ValType,
};

pub(crate) fn compile_args(
    co: &Compiler,
    sel: &mut Select,
    args: &[graph::Arg],
    role: &str,
) -> Result<()> {
    for arg in args {
        let res = match arg.name.as_str() {
            "id" => compile_arg_id(sel, arg),
            "search" => compile_arg_search(co, sel, arg),
            "where" => compile_arg_where(co, sel, arg, role),
            "orderby" | "order_by" | "order" => compile_arg_order_by(co, sel, arg),
            "distinct_on" | "distinct" => compile_arg_distinct_on(co, sel, arg),
            "limit" => compile_arg_limit(co, sel, arg),
            "offset" => compile_arg_offset(co, sel, arg),
            "first" => compile_arg_first_last(co, sel, arg, Order::Asc),
            "last" => compile_arg_first_last(co, sel, arg, Order::Desc),
            "after" => compile_arg_after_before(sel, arg, PagingType::ForwardCursor),
            "before" => compile_arg_after_before(sel, arg, PagingType::BackwardCursor),
            "find" => compile_arg_find(sel, arg),
            "args" => compile_arg_args(sel, arg),
            _ if sel.ti.is_function() => compile_func_table_arg(sel, arg),
            _ => Ok(()),
        };
        res.map_err(CompileError::in_argument(&arg.name))?;
    }
    Ok(())
}

/// `id` pins the primary key; roots only, forces a singular selector.
fn compile_arg_id(sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    let node = &arg.val;

    if sel.parent_id != -1 {
        return Err(CompileError::IdNotAtRoot);
    }
    if !matches!(node.node_type, NodeType::Num | NodeType::Str | NodeType::Var) {
        return Err(CompileError::ArgType("number, string or variable".into()));
    }

    let pk = sel
        .ti
        .primary_col
        .clone()
        .ok_or_else(|| CompileError::NoPrimaryKey(sel.table.clone()))?;

    let mut ex = Exp::new(ExpOp::Eq);
    ex.left.col = pk;

    match node.node_type {
        NodeType::Num => {
            node.val.parse::<i64>()?;
            ex.right.val_type = Some(ValType::Num);
            ex.right.val = node.val.clone();
        }
        NodeType::Str => {
            ex.right.val_type = Some(ValType::Str);
            ex.right.val = node.val.clone();
        }
        _ => {
            ex.right.val_type = Some(ValType::Var);
            ex.right.val = node.val.clone();
        }
    }

    sel.filter.replace(Arc::new(ex));
    sel.singular = true;
    Ok(())
}

/// `search` compiles to a full-text query against the table's tsvector (or
/// MySQL fulltext) index.
fn compile_arg_search(co: &Compiler, sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    if sel.ti.full_text.is_empty() {
        return Err(match co.schema.db_type() {
            "mysql" => CompileError::NoFullTextIndex(sel.table.clone()),
            _ => CompileError::NoTsVectorColumn(sel.table.clone()),
        });
    }
    if arg.val.node_type != NodeType::Var {
        return Err(CompileError::ArgType("variable".into()));
    }

    let mut ex = Exp::new(ExpOp::TsQuery);
    ex.right.val_type = Some(ValType::Var);
    ex.right.val = arg.val.val.clone();

    sel.add_iarg(Arg {
        arg_type: ArgType::Var,
        name: arg.name.clone(),
        val: arg.val.val.clone(),
        ..Default::default()
    });
    sel.filter.set(ex);
    Ok(())
}

fn compile_arg_where(co: &Compiler, sel: &mut Select, arg: &graph::Arg, role: &str) -> Result<()> {
    let ti = sel.ti.clone();
    let mut needs_user = false;
    let ex = compile_where_node(co, &ti, -1, &arg.val, &mut needs_user)?;

    if needs_user && role == ANON_ROLE {
        sel.skip_render = SkipType::UserNeeded;
    }
    sel.filter.set(ex);
    Ok(())
}

/// Recursive descent over a `where` object literal. Each key is a logical
/// combinator, a column with an operator object, or a reachable relation
/// (compiled as an existence subquery over the related table).
pub(crate) fn compile_where_node(
    co: &Compiler,
    ti: &DbTable,
    sel_id: i32,
    node: &Node,
    needs_user: &mut bool,
) -> Result<Exp> {
    if node.node_type != NodeType::Obj {
        return Err(CompileError::ArgType("object".into()));
    }

    let mut exps = Vec::with_capacity(node.children.len());
    for child in &node.children {
        exps.push(compile_where_pair(co, ti, sel_id, child, needs_user)?);
    }

    Ok(conjoin(exps))
}

fn conjoin(mut exps: Vec<Exp>) -> Exp {
    if exps.len() == 1 {
        return exps.remove(0);
    }
    let mut and = Exp::new(ExpOp::And);
    for e in exps {
        and.push_child(e);
    }
    and
}

fn compile_where_pair(
    co: &Compiler,
    ti: &DbTable,
    sel_id: i32,
    node: &Node,
    needs_user: &mut bool,
) -> Result<Exp> {
    let key = co.normalize(&node.name);

    match key.as_str() {
        "and" | "_and" => compile_bool_children(co, ti, sel_id, ExpOp::And, node, needs_user),
        "or" | "_or" => compile_bool_children(co, ti, sel_id, ExpOp::Or, node, needs_user),
        "not" | "_not" => {
            let mut not = Exp::new(ExpOp::Not);
            not.push_child(compile_where_node(co, ti, sel_id, node, needs_user)?);
            Ok(not)
        }
        _ => {
            if let Ok(col) = ti.column(&key) {
                return compile_op_obj(co, ti, col, node, needs_user);
            }

            if let Ok(path) = co.find_path(&key, &ti.name, "") {
                let related = path[0].lt.clone();
                let mut ex = Exp::new(ExpOp::SelectExists);

                for (i, p) in path.iter().enumerate().rev() {
                    let rel = rel_from_path(p);
                    let pid = if i == path.len() - 1 { sel_id } else { -1 };
                    let filter = build_filter(&rel, pid);
                    ex.joins.push(Join {
                        rel,
                        filter,
                        local: false,
                    });
                }

                let child = compile_where_node(co, &related, -1, node, needs_user)?;
                ex.push_child(child);
                return Ok(ex);
            }

            Err(CompileError::UnknownWhereKey {
                table: ti.name.clone(),
                name: key,
            })
        }
    }
}

fn compile_bool_children(
    co: &Compiler,
    ti: &DbTable,
    sel_id: i32,
    op: ExpOp,
    node: &Node,
    needs_user: &mut bool,
) -> Result<Exp> {
    let mut ex = Exp::new(op);
    match node.node_type {
        NodeType::List => {
            for item in &node.children {
                ex.push_child(compile_where_node(co, ti, sel_id, item, needs_user)?);
            }
        }
        NodeType::Obj => {
            for pair in &node.children {
                ex.push_child(compile_where_pair(co, ti, sel_id, pair, needs_user)?);
            }
        }
        _ => return Err(CompileError::ArgType("object or list".into())),
    }
    Ok(ex)
}

fn compile_op_obj(
    co: &Compiler,
    ti: &DbTable,
    col: sqlgraph_schema::DbColumn,
    node: &Node,
    needs_user: &mut bool,
) -> Result<Exp> {
    if node.node_type != NodeType::Obj || node.children.is_empty() {
        return Err(CompileError::WhereNotObject(col.name.clone()));
    }

    let mut exps = Vec::with_capacity(node.children.len());
    for op_node in &node.children {
        let mut ex = Exp::default();
        ex.left.col = col.clone();
        set_op_and_right(ti, &mut ex, &op_node.name, op_node, needs_user)?;
        exps.push(ex);
    }
    Ok(conjoin(exps))
}

fn set_op_and_right(
    ti: &DbTable,
    ex: &mut Exp,
    op_name: &str,
    node: &Node,
    needs_user: &mut bool,
) -> Result<()> {
    ex.op = match op_name {
        "eq" | "equals" => ExpOp::Eq,
        "neq" | "not_equals" | "notEquals" => ExpOp::NotEq,
        "gt" | "greater_than" | "greaterThan" => ExpOp::Gt,
        "lt" | "lesser_than" | "lesserThan" | "lessThan" => ExpOp::Lt,
        "gte" | "greater_or_equals" | "greaterOrEquals" | "greaterThanOrEquals" => ExpOp::GtEq,
        "lte" | "lesser_or_equals" | "lesserOrEquals" | "lessThanOrEquals" => ExpOp::LtEq,
        "in" => ExpOp::In,
        "nin" | "not_in" | "notIn" => ExpOp::NotIn,
        "like" => ExpOp::Like,
        "nlike" | "not_like" | "notLike" => ExpOp::NotLike,
        "ilike" => ExpOp::ILike,
        "nilike" | "not_ilike" | "notILike" => ExpOp::NotILike,
        "similar" => ExpOp::Similar,
        "nsimilar" | "not_similar" | "notSimilar" => ExpOp::NotSimilar,
        "regex" => ExpOp::Regex,
        "nregex" | "not_regex" | "notRegex" => ExpOp::NotRegex,
        "iregex" => ExpOp::IRegex,
        "niregex" | "not_iregex" | "notIRegex" => ExpOp::NotIRegex,
        "contains" => ExpOp::Contains,
        "contained_in" | "containedIn" => ExpOp::ContainedIn,
        "has_in_common" | "hasInCommon" => ExpOp::HasInCommon,
        "has_key" | "hasKey" => ExpOp::HasKey,
        "has_key_any" | "hasKeyAny" => ExpOp::HasKeyAny,
        "has_key_all" | "hasKeyAll" => ExpOp::HasKeyAll,
        "is_null" | "isNull" | "null" => {
            ex.op = if node.val == "true" {
                ExpOp::IsNull
            } else {
                ExpOp::IsNotNull
            };
            return Ok(());
        }
        "ndis" | "not_distinct" | "notDistinct" => ExpOp::NotDistinct,
        "dis" | "distinct" => ExpOp::Distinct,
        _ => return Err(CompileError::UnknownWhereOp(op_name.to_string())),
    };

    set_right(ti, ex, node, needs_user);
    Ok(())
}

fn set_right(ti: &DbTable, ex: &mut Exp, node: &Node, needs_user: &mut bool) {
    match node.node_type {
        NodeType::Str => {
            ex.right.val_type = Some(ValType::Str);
            ex.right.val = node.val.clone();
        }
        NodeType::Num => {
            ex.right.val_type = Some(ValType::Num);
            ex.right.val = node.val.clone();
        }
        NodeType::Bool => {
            ex.right.val_type = Some(ValType::Bool);
            ex.right.val = node.val.clone();
        }
        NodeType::Var => {
            ex.right.val_type = Some(ValType::Var);
            let mut parts = node.val.split('.');
            ex.right.val = parts.next().unwrap_or_default().to_string();
            ex.right.path = parts.map(str::to_string).collect();
            if ex.right.val == "user_id" {
                *needs_user = true;
            }
        }
        NodeType::List => {
            ex.right.val_type = Some(ValType::List);
            ex.right.list = node.children.iter().map(|c| c.val.clone()).collect();
            ex.right.list_type = node.children.first().map(|c| val_type_of(c.node_type));
        }
        NodeType::Obj => {
            ex.right.val_type = Some(ValType::Obj);
            ex.right.val = node_to_json(node);
        }
        NodeType::Label => {
            // A bare identifier may reference a sibling column; otherwise it
            // reads as a string literal.
            if let Ok(col) = ti.column(&node.val) {
                ex.right.col = col;
            } else {
                ex.right.val_type = Some(ValType::Str);
                ex.right.val = node.val.clone();
            }
        }
    }
}

fn val_type_of(t: NodeType) -> ValType {
    match t {
        NodeType::Num => ValType::Num,
        NodeType::Bool => ValType::Bool,
        NodeType::Var => ValType::Var,
        NodeType::Obj => ValType::Obj,
        NodeType::List => ValType::List,
        NodeType::Str | NodeType::Label => ValType::Str,
    }
}

fn node_to_json_value(node: &Node) -> serde_json::Value {
    use serde_json::Value;
    match node.node_type {
        NodeType::Str | NodeType::Label => Value::String(node.val.clone()),
        NodeType::Num => serde_json::from_str::<serde_json::Number>(&node.val)
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(node.val.clone())),
        NodeType::Bool => Value::Bool(node.val == "true"),
        NodeType::Var => Value::String(format!("${}", node.val)),
        NodeType::List => Value::Array(node.children.iter().map(node_to_json_value).collect()),
        NodeType::Obj => Value::Object(
            node.children
                .iter()
                .map(|c| (c.name.clone(), node_to_json_value(c)))
                .collect(),
        ),
    }
}

fn node_to_json(node: &Node) -> String {
    node_to_json_value(node).to_string()
}

fn compile_arg_order_by(co: &Compiler, sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    let node = &arg.val;

    if !matches!(node.node_type, NodeType::Obj | NodeType::Var) {
        return Err(CompileError::ArgType("object or variable".into()));
    }

    let mut cm: HashSet<String> = sel.order_by.iter().map(|ob| ob.col.name.clone()).collect();

    match node.node_type {
        NodeType::Obj => compile_arg_order_by_obj(co, sel, node, &mut cm),
        _ => compile_arg_order_by_var(sel, node, &mut cm),
    }
}

fn compile_arg_order_by_obj(
    co: &Compiler,
    sel: &mut Select,
    parent: &Node,
    cm: &mut HashSet<String>,
) -> Result<()> {
    let mut ob_list = Vec::with_capacity(parent.children.len());

    for node in &parent.children {
        let ob = compile_order_by_entry(co, sel, node)
            .map_err(|e| CompileError::InOrderBy(node.name.clone(), Box::new(e)))?;

        if !cm.insert(ob.col.name.clone()) {
            return Err(CompileError::InOrderBy(
                node.name.clone(),
                Box::new(CompileError::OrderByDefinedTwice),
            ));
        }
        ob_list.push(ob);
    }

    sel.order_by.extend(ob_list);
    Ok(())
}

fn compile_order_by_entry(co: &Compiler, sel: &mut Select, node: &Node) -> Result<OrderBy> {
    let mut ob = OrderBy::default();
    let mut ti = sel.ti.clone();
    let mut col_node = node;

    match node.node_type {
        NodeType::Str | NodeType::Label => {
            ob.order = Order::parse(&node.val)?;
        }
        NodeType::List => {
            ob = order_by_from_list(node)?;
        }
        NodeType::Obj => {
            // Sort over a related table; the join chain is marked local so
            // the generator knows it exists only for ordering.
            let path = co.find_path(&co.normalize(&node.name), &sel.ti.name, "")?;
            ti = path[0].lt.clone();

            col_node = node.children.first().ok_or(CompileError::OrderByInput)?;
            ob.order = Order::parse(&col_node.val)?;

            for p in path.iter().rev() {
                let rel = rel_from_path(p);
                let filter = build_filter(&rel, -1);
                sel.joins.push(Join {
                    rel,
                    filter,
                    local: true,
                });
            }
        }
        _ => return Err(CompileError::OrderByInput),
    }

    let name = co.normalize(&col_node.name);
    ob.col = ti.column(&name)?;
    Ok(ob)
}

fn order_by_from_list(parent: &Node) -> Result<OrderBy> {
    if parent.children.len() != 2 {
        return Err(CompileError::OrderByListShape);
    }
    let mut ob = OrderBy {
        var: parent.children[0].val.clone(),
        ..Default::default()
    };
    ob.order = Order::parse(&parent.children[1].val)?;
    Ok(ob)
}

/// A bare variable selects among the table's preconfigured orderings; every
/// preset compiles in, tagged with the variable and preset key so the
/// generator can pick at execution time.
fn compile_arg_order_by_var(sel: &mut Select, node: &Node, cm: &mut HashSet<String>) -> Result<()> {
    let presets = match &sel.tc {
        Some(tc) => tc.order_by.clone(),
        None => return Ok(()),
    };

    for (key, values) in &presets {
        let mut ob_list = Vec::with_capacity(values.len());

        for (col_name, dir) in values {
            let mut ob = OrderBy {
                key_var: node.val.clone(),
                key: key.clone(),
                ..Default::default()
            };
            ob.order = Order::parse(dir).unwrap_or(Order::Asc);
            ob.col = sel.ti.column(col_name)?;

            if cm.contains(&ob.col.name) {
                return Err(CompileError::OrderByDuplicate(ob.col.name.clone()));
            }
            ob_list.push(ob);
        }
        sel.order_by.extend(ob_list);
    }
    Ok(())
}

/// `distinct_on` fills the distinct list, except on MySQL where it quietly
/// becomes an ascending order instead.
fn compile_arg_distinct_on(co: &Compiler, sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    let node = &arg.val;

    if !matches!(
        node.node_type,
        NodeType::List | NodeType::Str | NodeType::Label
    ) {
        return Err(CompileError::DistinctInput);
    }

    let names: Vec<&str> = match node.node_type {
        NodeType::List => node.children.iter().map(|c| c.val.as_str()).collect(),
        _ => vec![node.val.as_str()],
    };

    for name in names {
        let col = sel.ti.column(&co.normalize(name))?;
        if co.schema.db_type() == "mysql" {
            sel.order_by.push(OrderBy {
                order: Order::Asc,
                col,
                ..Default::default()
            });
        } else {
            sel.distinct_on.push(col);
        }
    }
    Ok(())
}

fn compile_arg_limit(co: &Compiler, sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    let node = &arg.val;
    match node.node_type {
        NodeType::Num => sel.paging.limit = node.val.parse::<i32>()?,
        NodeType::Var => {
            if co.schema.db_type() == "mysql" {
                return Err(CompileError::DbArgValue {
                    db: "mysql".into(),
                    arg: "limit".into(),
                    want: "number".into(),
                });
            }
            sel.paging.limit_var = node.val.clone();
        }
        _ => return Err(CompileError::ArgType("number or variable".into())),
    }
    Ok(())
}

fn compile_arg_offset(co: &Compiler, sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    let node = &arg.val;
    match node.node_type {
        NodeType::Num => sel.paging.offset = node.val.parse::<i32>()?,
        NodeType::Var => {
            if co.schema.db_type() == "mysql" {
                return Err(CompileError::DbArgValue {
                    db: "mysql".into(),
                    arg: "offset".into(),
                    want: "number".into(),
                });
            }
            sel.paging.offset_var = node.val.clone();
        }
        _ => return Err(CompileError::ArgType("number or variable".into())),
    }
    Ok(())
}

/// `first`/`last` are `limit` sugar that also switch the selector into
/// cursor mode and record the scan direction.
fn compile_arg_first_last(
    co: &Compiler,
    sel: &mut Select,
    arg: &graph::Arg,
    order: Order,
) -> Result<()> {
    compile_arg_limit(co, sel, arg)?;

    if !sel.singular {
        sel.paging.cursor = true;
    }
    sel.order = order;
    Ok(())
}

fn compile_arg_after_before(sel: &mut Select, arg: &graph::Arg, pt: PagingType) -> Result<()> {
    let node = &arg.val;

    if node.node_type != NodeType::Var || node.val != "cursor" {
        return Err(CompileError::CursorVariable(arg.name.clone()));
    }
    sel.paging.kind = pt;
    if !sel.singular {
        sel.paging.cursor = true;
    }
    Ok(())
}

fn compile_arg_find(sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    if sel.rel.kind != sqlgraph_schema::RelKind::Recursive {
        return Err(CompileError::FindNotRecursive(sel.field_name.clone()));
    }
    if arg.val.val != "parents" && arg.val.val != "children" {
        return Err(CompileError::FindValue);
    }
    sel.add_iarg(Arg {
        name: arg.name.clone(),
        val: arg.val.val.clone(),
        ..Default::default()
    });
    Ok(())
}

/// Positional argument list for a table function, typed from the declared
/// inputs in order.
fn compile_arg_args(sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    if !sel.ti.is_function() {
        return Err(CompileError::NotDbFunction(sel.ti.name.clone()));
    }
    let func = sel.ti.func.clone().unwrap_or_default();
    if func.inputs.is_empty() {
        return Err(CompileError::FunctionNoInputs(sel.ti.name.clone()));
    }
    if arg.val.node_type != NodeType::List {
        return Err(CompileError::ArgValue {
            arg: "args".into(),
            want: "list".into(),
        });
    }

    for (i, n) in arg.val.children.iter().enumerate() {
        let input = func
            .inputs
            .get(i)
            .ok_or_else(|| CompileError::FunctionTooManyArgs(sel.ti.name.clone()))?;

        let mut a = Arg {
            dtype: input.param_type.clone(),
            ..Default::default()
        };
        match n.node_type {
            NodeType::Label => {
                a.arg_type = ArgType::Col;
                a.col = Some(sel.ti.column(&n.val)?);
            }
            NodeType::Var => {
                a.arg_type = ArgType::Var;
                a.val = n.val.clone();
            }
            _ => a.val = n.val.clone(),
        }
        sel.args.push(a);
    }
    Ok(())
}

/// A named argument on a table-function selector resolves against the
/// function's declared parameters.
fn compile_func_table_arg(sel: &mut Select, arg: &graph::Arg) -> Result<()> {
    let func = sel.ti.func.clone().unwrap_or_default();
    let input = func
        .inputs
        .iter()
        .find(|p| p.name == arg.name)
        .ok_or_else(|| CompileError::FunctionUnknownParam {
            func: sel.ti.name.clone(),
            name: arg.name.clone(),
        })?;

    let mut a = Arg {
        name: arg.name.clone(),
        dtype: input.param_type.clone(),
        val: arg.val.val.clone(),
        ..Default::default()
    };
    if arg.val.node_type == NodeType::Var {
        a.arg_type = ArgType::Var;
    }
    sel.args.push(a);
    Ok(())
}
