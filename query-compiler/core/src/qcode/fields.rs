//! Sub-field compilation: columns, aggregate and scalar function calls, and
//! nested selections pushed back onto the selector work list.

use sqlgraph_schema::{DbFunction, RelKind};

use crate::error::{CompileError, Result};
use crate::graph::{self, FieldType, NodeType};
use crate::qcode::compile::{Compiler, ANON_ROLE};
use crate::qcode::{
    directives, Arg, ArgType, Column, Field, FieldKind, Function, Select, SkipType,
};
use crate::util;

const AGGREGATES: [&str; 5] = ["count", "sum", "avg", "max", "min"];

pub(crate) fn compile_fields(
    co: &Compiler,
    st: &mut Vec<i32>,
    op: &graph::Operation,
    sel: &mut Select,
    field: &graph::Field,
    role: &str,
) -> Result<()> {
    let mut nested: Vec<i32> = Vec::new();

    for &cid in &field.children {
        let child = &op.fields[cid as usize];

        if child.name == "__typename" {
            sel.typename = true;
            continue;
        }
        if child.field_type == FieldType::Keyword {
            continue;
        }

        // Fields with their own selection set become selectors of their own.
        if !child.children.is_empty()
            || matches!(child.field_type, FieldType::Union | FieldType::Member)
        {
            nested.push(child.id);
            continue;
        }

        let name;
        let display;
        if co.conf.enable_camelcase {
            display = if child.alias.is_empty() {
                child.name.clone()
            } else {
                child.alias.clone()
            };
            name = util::to_snake(&child.name);
        } else {
            name = child.name.clone();
            display = if child.alias.is_empty() {
                child.name.clone()
            } else {
                child.alias.clone()
            };
        }

        let mut f = if sel.ti.has_column(&name) {
            Field {
                kind: FieldKind::Col,
                col: sel.ti.column(&name)?,
                field_name: display,
                ..Default::default()
            }
        } else if let Some(func) = compile_aggregate(sel, &name, &display)? {
            sel.funcs.push(func);
            continue;
        } else if let Some(func) = co.schema.function(&name).cloned() {
            compile_field_func(sel, child, func, &display)?
        } else {
            // Surface the failed column lookup.
            Field {
                kind: FieldKind::Col,
                col: sel.ti.column(&name)?,
                field_name: display,
                ..Default::default()
            }
        };

        compile_field_directives(co, sel, &mut f, &child.directives, role)?;
        sel.fields.push(f);
    }

    // Reversed so the work stack pops nested selections in document order.
    for &cid in nested.iter().rev() {
        st.push(cid | (sel.id << 16));
    }

    if !sel.funcs.is_empty() && sel.fields.iter().any(|f| f.kind == FieldKind::Col) {
        sel.group_cols = true;
    }

    // Recursive selectors wrap the table in an inner query that must carry
    // the selected columns.
    if sel.rel.kind == RelKind::Recursive {
        sel.base_cols = sel
            .fields
            .iter()
            .filter(|f| f.kind == FieldKind::Col)
            .map(|f| Column {
                col: f.col.clone(),
                field_name: f.field_name.clone(),
            })
            .collect();
    }

    Ok(())
}

/// `count` (bare) and `<agg>_<column>` select aggregate functions.
fn compile_aggregate(sel: &Select, name: &str, display: &str) -> Result<Option<Function>> {
    if name == "count" {
        return Ok(Some(Function {
            name: "count".to_string(),
            field_name: display.to_string(),
            agg: true,
            ..Default::default()
        }));
    }

    for agg in AGGREGATES {
        if let Some(rest) = name.strip_prefix(agg).and_then(|r| r.strip_prefix('_')) {
            let col = sel.ti.column(rest)?;
            return Ok(Some(Function {
                name: agg.to_string(),
                col: Some(col),
                field_name: name.to_string(),
                alias: display.to_string(),
                agg: true,
                ..Default::default()
            }));
        }
    }
    Ok(None)
}

/// A scalar database function selected as a field, with named arguments
/// resolved against its declared parameters.
fn compile_field_func(
    sel: &Select,
    child: &graph::Field,
    func: DbFunction,
    display: &str,
) -> Result<Field> {
    let mut f = Field {
        kind: FieldKind::Func,
        field_name: display.to_string(),
        ..Default::default()
    };

    for garg in &child.args {
        let input = func
            .inputs
            .iter()
            .find(|p| p.name == garg.name)
            .ok_or_else(|| CompileError::FunctionUnknownParam {
                func: func.name.clone(),
                name: garg.name.clone(),
            })?;

        let mut a = Arg {
            name: garg.name.clone(),
            dtype: input.param_type.clone(),
            ..Default::default()
        };
        match garg.val.node_type {
            NodeType::Label => {
                a.arg_type = ArgType::Col;
                a.col = Some(sel.ti.column(&garg.val.val)?);
            }
            NodeType::Var => {
                a.arg_type = ArgType::Var;
                a.val = garg.val.val.clone();
            }
            _ => a.val = garg.val.val.clone(),
        }
        f.args.push(a);
    }

    f.func = Some(func);
    Ok(f)
}

fn compile_field_directives(
    co: &Compiler,
    sel: &mut Select,
    f: &mut Field,
    dirs: &[graph::Directive],
    role: &str,
) -> Result<()> {
    for d in dirs {
        let res = match d.name.as_str() {
            "skip" => field_skip_include(co, true, sel, f, d, role),
            "include" => field_skip_include(co, false, sel, f, d, role),
            other => Err(CompileError::UnknownFieldDirective(other.to_string())),
        };
        res.map_err(CompileError::in_directive(&d.name))?;
    }
    Ok(())
}

fn field_skip_include(
    co: &Compiler,
    skip: bool,
    sel: &mut Select,
    f: &mut Field,
    d: &graph::Directive,
    role: &str,
) -> Result<()> {
    // Function fields render outside the row scope, so their filters never
    // anchor to the selector.
    let sel_id = if f.kind == FieldKind::Func { -1 } else { sel.id };
    let ti = sel.ti.clone();
    let outcome = directives::compile_skip_include(co, skip, &ti, sel_id, d, role)?;

    for ex in outcome.filters {
        f.filter.set(ex);
    }
    if outcome.needs_user && role == ANON_ROLE {
        sel.skip_render = SkipType::UserNeeded;
    }
    if outcome.drop {
        f.skip_render = SkipType::Drop;
    }
    Ok(())
}
