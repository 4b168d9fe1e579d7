//! Mutation shape: the single root field must carry exactly one of the
//! `insert | update | upsert | delete` action arguments.

use crate::error::{CompileError, Result};
use crate::graph::{self, NodeType};
use crate::qcode::{QCode, QType};

pub(crate) fn set_mutation_type(qc: &mut QCode, op: &graph::Operation) -> Result<()> {
    let mut found = false;

    for arg in &op.fields[0].args {
        match arg.name.as_str() {
            "insert" => {
                qc.stype = QType::Insert;
                set_action_var(qc, arg)?;
                found = true;
            }
            "update" => {
                qc.stype = QType::Update;
                set_action_var(qc, arg)?;
                found = true;
            }
            "upsert" => {
                qc.stype = QType::Upsert;
                set_action_var(qc, arg)?;
                found = true;
            }
            "delete" => {
                qc.stype = QType::Delete;
                if arg.val.node_type != NodeType::Bool || arg.val.val != "true" {
                    return Err(CompileError::DeleteNotTrue);
                }
                found = true;
            }
            _ => {}
        }
    }

    if !found {
        return Err(CompileError::MutationMissingAction);
    }
    Ok(())
}

/// The action value must be a variable, an object, or a non-empty list
/// whose first element is an object.
fn set_action_var(qc: &mut QCode, arg: &graph::Arg) -> Result<()> {
    let v = &arg.val;
    let ok = matches!(v.node_type, NodeType::Var | NodeType::Obj)
        || (v.node_type == NodeType::List
            && !v.children.is_empty()
            && v.children[0].node_type == NodeType::Obj);

    if !ok {
        return Err(CompileError::ArgValue {
            arg: arg.name.clone(),
            want: "variable, an object or a list of objects".into(),
        });
    }

    qc.action_var = v.val.clone();
    qc.action_arg = Some(arg.clone());
    Ok(())
}
