//! The `@constraint` / `@validate` directive: per-variable validation rules
//! packed into the compact string format the downstream validator executes.

use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;
use once_cell::sync::Lazy;

use crate::error::{CompileError, Result};
use crate::graph::{Arg, Directive, NodeType};
use crate::qcode::QCode;

/// Variable name → packed rule descriptor.
pub type Constraints = IndexMap<String, String>;

struct Validator {
    name: &'static str,
    types: &'static [NodeType],
    single: bool,
}

impl Validator {
    const fn new(name: &'static str, types: &'static [NodeType]) -> Self {
        Validator {
            name,
            types,
            single: false,
        }
    }

    const fn single(name: &'static str, types: &'static [NodeType]) -> Self {
        Validator {
            name,
            types,
            single: true,
        }
    }
}

static VALIDATORS: Lazy<HashMap<&'static str, Validator>> = Lazy::new(|| {
    use NodeType::{Bool, List, Num, Obj, Str};
    HashMap::from([
        ("variable", Validator::new("variable", &[Str])),
        ("error", Validator::new("error", &[Str])),
        ("unique", Validator::single("unique", &[Bool])),
        ("format", Validator::single("format", &[Str])),
        ("required", Validator::single("required", &[Bool])),
        ("requiredIf", Validator::new("required_if", &[Obj])),
        ("requiredUnless", Validator::new("required_unless", &[Obj])),
        ("requiredWith", Validator::new("required_with", &[List, Str])),
        ("requiredWithAll", Validator::new("required_with_all", &[List, Str])),
        ("requiredWithout", Validator::new("required_without", &[List, Str])),
        ("requiredWithoutAll", Validator::new("required_without_all", &[List, Str])),
        ("length", Validator::new("len", &[Str, Num])),
        ("max", Validator::new("max", &[Str, Num])),
        ("min", Validator::new("min", &[Str, Num])),
        ("equals", Validator::new("eq", &[Str, Num])),
        ("notEquals", Validator::new("neq", &[Str, Num])),
        ("oneOf", Validator::new("oneof", &[List, Num, List, Str])),
        ("greaterThan", Validator::new("gt", &[Str, Num])),
        ("greaterThanOrEquals", Validator::new("gte", &[Str, Num])),
        ("lessThan", Validator::new("lt", &[Str, Num])),
        ("lessThanOrEquals", Validator::new("lte", &[Str, Num])),
        ("equalsField", Validator::new("eqfield", &[Str])),
        ("notEqualsField", Validator::new("nefield", &[Str])),
        ("greaterThanField", Validator::new("gtfield", &[Str])),
        ("greaterThanOrEqualsField", Validator::new("gtefield", &[Str])),
        ("lessThanField", Validator::new("ltfield", &[Str])),
        ("lessThanOrEqualsField", Validator::new("ltefield", &[Str])),
    ])
});

/// Packs one `@constraint` directive into `QCode::consts`. Rule tokens keep
/// argument order; single-arity toggles pack as their bare name, everything
/// else as `name=value`; an error message trails after `~`.
pub(crate) fn compile_directive_constraint(qc: &mut QCode, d: &Directive) -> Result<()> {
    let mut var_name = String::new();
    let mut err_msg = String::new();
    let mut vals: Vec<String> = Vec::new();

    for a in &d.args {
        if a.name == "variable" && !a.val.val.is_empty() {
            var_name = a
                .val
                .val
                .strip_prefix('$')
                .unwrap_or(&a.val.val)
                .to_string();
            continue;
        }
        if a.name == "error" && !a.val.val.is_empty() {
            err_msg = a.val.val.clone();
            continue;
        }
        if a.name == "format" && !a.val.val.is_empty() {
            vals.push(a.val.val.clone());
            continue;
        }

        let Some(v) = VALIDATORS.get(a.name.as_str()) else {
            continue;
        };
        validate_constraint(a, v)?;

        if v.single {
            vals.push(v.name.to_string());
            continue;
        }

        let value = match a.val.node_type {
            NodeType::Str | NodeType::Num | NodeType::Bool => a.val.val.clone(),
            // Compound values flatten to space-separated tokens.
            NodeType::Obj => a
                .val
                .children
                .iter()
                .flat_map(|c| [c.name.as_str(), c.val.as_str()])
                .join(" "),
            NodeType::List => a.val.children.iter().map(|c| c.val.as_str()).join(" "),
            _ => String::new(),
        };
        vals.push(format!("{}={}", v.name, value));
    }

    if var_name.is_empty() {
        return Err(CompileError::ConstraintNoVariable);
    }

    let mut opt = vals.iter().join(",");
    if !err_msg.is_empty() {
        opt.push('~');
        opt.push_str(&err_msg);
    }

    qc.consts.insert(var_name, opt);
    Ok(())
}

fn validate_constraint(a: &Arg, v: &Validator) -> Result<()> {
    let mut list = false;
    for &t in v.types {
        if t == NodeType::List {
            list = true;
        } else if list && is_arg_list(a, t) {
            return Ok(());
        } else if a.val.node_type == t {
            return Ok(());
        }
    }

    let mut list = false;
    let mut want = String::new();
    for &t in v.types {
        if t == NodeType::List {
            list = true;
            continue;
        }
        if !want.is_empty() {
            want.push_str(", ");
        }
        if list {
            want.push_str("a list of ");
            list = false;
        }
        want.push_str(&t.to_string());
    }
    Err(CompileError::ConstraintType(want))
}

fn is_arg_list(a: &Arg, elem: NodeType) -> bool {
    a.val.node_type == NodeType::List
        && !a.val.children.is_empty()
        && a.val.children[0].node_type == elem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use pretty_assertions::assert_eq;

    fn constraint(args: Vec<Arg>) -> QCode {
        let mut qc = QCode::default();
        let d = Directive {
            name: "constraint".into(),
            args,
        };
        compile_directive_constraint(&mut qc, &d).unwrap();
        qc
    }

    #[test]
    fn packs_in_argument_order() {
        let qc = constraint(vec![
            Arg::new("variable", Node::str("x")),
            Arg::new("min", Node::num("3")),
            Arg::new("max", Node::num("10")),
            Arg::new("required", Node::bool(true)),
            Arg::new("error", Node::str("nope")),
        ]);
        assert_eq!(qc.consts["x"], "min=3,max=10,required~nope");
    }

    #[test]
    fn format_value_packs_bare() {
        let qc = constraint(vec![
            Arg::new("variable", Node::str("name")),
            Arg::new("required", Node::bool(true)),
            Arg::new("min", Node::num("3")),
            Arg::new("max", Node::num("50")),
            Arg::new("format", Node::str("email")),
            Arg::new("error", Node::str("bad email")),
        ]);
        assert_eq!(qc.consts["name"], "required,min=3,max=50,email~bad email");
    }

    #[test]
    fn variable_sigil_is_stripped() {
        let qc = constraint(vec![
            Arg::new("variable", Node::str("$id")),
            Arg::new("required", Node::bool(true)),
        ]);
        assert!(qc.consts.contains_key("id"));
    }

    #[test]
    fn compound_values_flatten() {
        let qc = constraint(vec![
            Arg::new("variable", Node::str("x")),
            Arg::new(
                "requiredIf",
                Node::obj([("status", Node::str("active"))]),
            ),
            Arg::new(
                "oneOf",
                Node::list([Node::num("1"), Node::num("2"), Node::num("3")]),
            ),
        ]);
        assert_eq!(qc.consts["x"], "required_if=status active,oneof=1 2 3");
    }

    #[test]
    fn missing_variable_errors() {
        let mut qc = QCode::default();
        let d = Directive {
            name: "constraint".into(),
            args: vec![Arg::new("required", Node::bool(true))],
        };
        assert!(matches!(
            compile_directive_constraint(&mut qc, &d),
            Err(CompileError::ConstraintNoVariable)
        ));
    }

    #[test]
    fn wrong_rule_type_errors() {
        let mut qc = QCode::default();
        let d = Directive {
            name: "constraint".into(),
            args: vec![
                Arg::new("variable", Node::str("x")),
                Arg::new("min", Node::bool(true)),
            ],
        };
        let err = compile_directive_constraint(&mut qc, &d).unwrap_err();
        assert_eq!(err.to_string(), "value must be of type: string, number");
    }
}
