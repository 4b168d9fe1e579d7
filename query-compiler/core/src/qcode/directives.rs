//! Directive compilers, dispatched by name at operation, selector and
//! field scope.

use sqlgraph_schema::{DbTable, RelKind};

use crate::error::{CompileError, Result};
use crate::graph::{Directive, NodeType};
use crate::qcode::compile::{Compiler, ANON_ROLE};
use crate::qcode::{args, constraints, Exp, ExpOp, QCode, Select, SkipType, ValType};

pub(crate) fn compile_op_directives(qc: &mut QCode, dirs: &[Directive]) -> Result<()> {
    for d in dirs {
        match d.name.as_str() {
            "cacheControl" => compile_directive_cache_control(qc, d)?,
            "script" => compile_directive_script(qc, d)?,
            "constraint" | "validate" => constraints::compile_directive_constraint(qc, d)?,
            "validation" => compile_directive_validation(qc, d)?,
            other => return Err(CompileError::UnknownOpDirective(other.to_string())),
        }
    }
    Ok(())
}

/// Directives that must run before relationship inference.
pub(crate) fn compile_selector_directives_pre(sel: &mut Select, dirs: &[Directive]) -> Result<()> {
    for d in dirs {
        let res = match d.name.as_str() {
            "schema" => compile_directive_schema(sel, d),
            "notRelated" | "not_related" => {
                sel.rel.kind = RelKind::Skip;
                Ok(())
            }
            "through" => compile_directive_through(sel, d),
            _ => Ok(()),
        };
        res.map_err(CompileError::in_directive(&d.name))?;
    }
    Ok(())
}

pub(crate) fn compile_selector_directives_post(
    co: &Compiler,
    sel: &mut Select,
    dirs: &[Directive],
    role: &str,
) -> Result<()> {
    for d in dirs {
        let res = match d.name.as_str() {
            "schema" | "through" | "notRelated" | "not_related" => Ok(()),
            "skip" => compile_select_skip_include(co, true, sel, d, role),
            "include" => compile_select_skip_include(co, false, sel, d, role),
            "object" => {
                sel.singular = true;
                sel.paging.limit = 1;
                Ok(())
            }
            _ => Err(CompileError::UnknownSelectorDirective),
        };
        res.map_err(CompileError::in_directive(&d.name))?;
    }
    Ok(())
}

fn compile_directive_schema(sel: &mut Select, d: &Directive) -> Result<()> {
    let arg = d
        .args
        .first()
        .ok_or_else(|| CompileError::DirectiveMissingArg("name".into()))?;
    if arg.val.node_type != NodeType::Str {
        return Err(CompileError::ArgType("string".into()));
    }
    sel.schema = arg.val.val.clone();
    Ok(())
}

fn compile_directive_through(sel: &mut Select, d: &Directive) -> Result<()> {
    let arg = d.args.first().ok_or(CompileError::ThroughMissingArg)?;
    if arg.name == "table" || arg.name == "column" {
        if arg.val.node_type != NodeType::Str {
            return Err(CompileError::ArgValue {
                arg: arg.name.clone(),
                want: "string".into(),
            });
        }
        sel.through = arg.val.val.clone();
    }
    Ok(())
}

fn compile_select_skip_include(
    co: &Compiler,
    skip: bool,
    sel: &mut Select,
    d: &Directive,
    role: &str,
) -> Result<()> {
    let ti = sel.ti.clone();
    let outcome = compile_skip_include(co, skip, &ti, -1, d, role)?;

    for ex in outcome.filters {
        sel.filter.set(ex);
    }
    if outcome.needs_user && role == ANON_ROLE {
        sel.skip_render = SkipType::UserNeeded;
    }
    if outcome.drop {
        sel.skip_render = SkipType::Drop;
    }
    Ok(())
}

pub(crate) struct SkipInclude {
    pub filters: Vec<Exp>,
    pub drop: bool,
    pub needs_user: bool,
}

/// `@skip` / `@include` share one compiler. `if_role` compares against the
/// caller's role and either drops or keeps outright; `if` with a variable
/// folds an equals-true test into the filter; `if` with a filter object
/// compiles it as a sub-filter, negated under `@skip`.
pub(crate) fn compile_skip_include(
    co: &Compiler,
    skip: bool,
    ti: &DbTable,
    sel_id: i32,
    d: &Directive,
    role: &str,
) -> Result<SkipInclude> {
    if d.args.is_empty() {
        return Err(CompileError::SkipIncludeArgs);
    }

    let mut out = SkipInclude {
        filters: Vec::new(),
        drop: false,
        needs_user: false,
    };

    for arg in &d.args {
        match arg.name.as_str() {
            "if" => match arg.val.node_type {
                NodeType::Var => {
                    let mut ex = Exp::new(if skip {
                        ExpOp::NotEqTrue
                    } else {
                        ExpOp::EqTrue
                    });
                    ex.right.val_type = Some(ValType::Var);
                    ex.right.val = arg.val.val.clone();
                    out.filters.push(ex);
                }
                NodeType::Obj => {
                    let mut needs_user = false;
                    let ex = args::compile_where_node(co, ti, sel_id, &arg.val, &mut needs_user)?;
                    out.needs_user |= needs_user;

                    if skip {
                        let mut not = Exp::new(ExpOp::Not);
                        not.push_child(ex);
                        out.filters.push(not);
                    } else {
                        out.filters.push(ex);
                    }
                }
                _ => {
                    return Err(CompileError::ArgValue {
                        arg: "if".into(),
                        want: "variable or filter expression".into(),
                    })
                }
            },
            "if_role" | "ifRole" => {
                if arg.val.node_type != NodeType::Str {
                    return Err(CompileError::ArgValue {
                        arg: arg.name.clone(),
                        want: "string".into(),
                    });
                }
                if (skip && arg.val.val == role) || (!skip && arg.val.val != role) {
                    out.drop = true;
                }
            }
            other => return Err(CompileError::InvalidArgument(other.to_string())),
        }
    }
    Ok(out)
}

fn compile_directive_cache_control(qc: &mut QCode, d: &Directive) -> Result<()> {
    let mut max_age = String::new();
    let mut scope = String::new();

    for arg in &d.args {
        match arg.name.as_str() {
            "maxAge" => {
                if arg.val.node_type != NodeType::Num {
                    return Err(CompileError::ArgValue {
                        arg: "maxAge".into(),
                        want: "number".into(),
                    });
                }
                max_age = arg.val.val.clone();
            }
            "scope" => {
                if arg.val.node_type != NodeType::Str {
                    return Err(CompileError::ArgValue {
                        arg: "scope".into(),
                        want: "string".into(),
                    });
                }
                scope = arg.val.val.clone();
            }
            other => return Err(CompileError::InvalidArgument(other.to_string())),
        }
    }

    if max_age.is_empty() {
        return Err(CompileError::DirectiveMissingArg("maxAge".into()));
    }

    qc.cache.header = if scope.is_empty() {
        format!("max-age={max_age}")
    } else {
        format!("max-age={max_age} {scope}")
    };
    Ok(())
}

fn compile_directive_script(qc: &mut QCode, d: &Directive) -> Result<()> {
    let arg = d.args.first().ok_or_else(|| CompileError::ArgValue {
        arg: "name".into(),
        want: "string".into(),
    })?;

    if arg.name == "name" {
        if arg.val.node_type != NodeType::Str {
            return Err(CompileError::ArgValue {
                arg: "name".into(),
                want: "string".into(),
            });
        }
        qc.script.name = arg.val.val.clone();
    }

    if qc.script.name.is_empty() {
        qc.script.name = qc.name.clone();
    }
    if qc.script.name.is_empty() {
        return Err(CompileError::DirectiveMissingArg("name".into()));
    }

    if std::path::Path::new(&qc.script.name).extension().is_none() {
        qc.script.name.push_str(".js");
    }
    Ok(())
}

fn compile_directive_validation(qc: &mut QCode, d: &Directive) -> Result<()> {
    if d.args.is_empty() {
        return Err(CompileError::ValidationMissingArgs);
    }

    for arg in &d.args {
        match arg.name.as_str() {
            "src" | "source" => qc.validation.source = arg.val.val.clone(),
            "type" | "lang" => qc.validation.lang = arg.val.val.clone(),
            other => return Err(CompileError::InvalidArgument(other.to_string())),
        }
    }

    if qc.validation.source.is_empty() {
        return Err(CompileError::ValidationNoSource);
    }
    if qc.validation.lang.is_empty() {
        return Err(CompileError::ValidationNoType);
    }
    Ok(())
}
