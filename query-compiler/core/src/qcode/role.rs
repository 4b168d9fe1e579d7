//! The role/trust registry: per (role, schema, table, field) policy views
//! with compiled row-filter templates, resolved lazily and cached for the
//! life of the compiler.

use std::sync::Arc;

use sqlgraph_schema::DbTable;

use crate::config::{OpPolicy, RoleTable};
use crate::error::Result;
use crate::graph::Node;
use crate::qcode::compile::Compiler;
use crate::qcode::{args, Exp, ExpOp, QCode, QType, Select};

/// Policy for one operation kind, with its filter template compiled and
/// shared across compilations.
#[derive(Debug, Default)]
pub(crate) struct OpView {
    pub filter: Option<Arc<Exp>>,
    pub user_needed: bool,
    pub limit: i32,
    pub block: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RoleView {
    query: OpView,
    insert: OpView,
    update: OpView,
    upsert: OpView,
    delete: OpView,
}

impl RoleView {
    fn blocked(block: bool) -> Self {
        let mk = || OpView {
            block,
            ..Default::default()
        };
        RoleView {
            query: mk(),
            insert: mk(),
            update: mk(),
            upsert: mk(),
            delete: mk(),
        }
    }

    fn op(&self, t: QType) -> &OpView {
        match t {
            QType::Insert => &self.insert,
            QType::Update => &self.update,
            QType::Upsert => &self.upsert,
            QType::Delete => &self.delete,
            _ => &self.query,
        }
    }

    pub fn is_blocked(&self, t: QType) -> bool {
        self.op(t).block
    }

    pub fn limit(&self, t: QType) -> i32 {
        self.op(t).limit
    }

    pub fn filter(&self, t: QType) -> (Option<Arc<Exp>>, bool) {
        let op = self.op(t);
        (op.filter.clone(), op.user_needed)
    }
}

/// Folds the role's filter template into the selector's `where`. Returns
/// whether the template needs an authenticated user.
pub(crate) fn add_role_filters(qc: &QCode, sel: &mut Select, tr: &RoleView) -> bool {
    let (filter, user_needed) = tr.filter(qc.stype);
    if let Some(fil) = filter {
        match fil.op {
            ExpOp::Nop => {}
            ExpOp::False => sel.filter.replace(fil),
            _ => sel.filter.set_shared(fil),
        }
        return user_needed;
    }
    false
}

impl Compiler {
    /// Resolves the policy view for `(role, schema, table, field)`. Views
    /// compile on first use and live in a write-behind cache; the query-hot
    /// path only reads.
    pub(crate) fn role_view(
        &self,
        role: &str,
        schema: &str,
        table: &str,
        field: &str,
        ti: &DbTable,
    ) -> Result<Arc<RoleView>> {
        let key = format!("{role}:{schema}:{table}:{field}");

        {
            let cache = self.roles.read().unwrap_or_else(|e| e.into_inner());
            if let Some(view) = cache.get(&key) {
                return Ok(Arc::clone(view));
            }
        }

        let view = Arc::new(self.build_role_view(role, schema, table, field, ti)?);
        let mut cache = self.roles.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(cache.entry(key).or_insert(view)))
    }

    fn build_role_view(
        &self,
        role: &str,
        schema: &str,
        table: &str,
        field: &str,
        ti: &DbTable,
    ) -> Result<RoleView> {
        let table_conf = self.conf.roles.iter().find(|r| r.name == role).and_then(|r| {
            // An entry keyed by the queried field name overrides the
            // table-level entry.
            find_role_table(&r.tables, schema, field)
                .or_else(|| find_role_table(&r.tables, schema, table))
        });

        let Some(tc) = table_conf else {
            return Ok(RoleView::blocked(self.conf.default_block));
        };

        Ok(RoleView {
            query: self.build_op_view(ti, tc.query.as_ref())?,
            insert: self.build_op_view(ti, tc.insert.as_ref())?,
            update: self.build_op_view(ti, tc.update.as_ref())?,
            upsert: self.build_op_view(ti, tc.upsert.as_ref())?,
            delete: self.build_op_view(ti, tc.delete.as_ref())?,
        })
    }

    fn build_op_view(&self, ti: &DbTable, policy: Option<&OpPolicy>) -> Result<OpView> {
        let Some(p) = policy else {
            return Ok(OpView {
                block: self.conf.default_block,
                ..Default::default()
            });
        };

        let (filter, user_needed) = self.compile_policy_filter(ti, &p.filters)?;
        Ok(OpView {
            filter,
            user_needed,
            limit: p.limit,
            block: p.block,
        })
    }

    /// Compiles a policy's filter templates through the `where` grammar.
    /// Multiple templates conjoin; the string `"false"` denies all rows.
    fn compile_policy_filter(
        &self,
        ti: &DbTable,
        filters: &[serde_json::Value],
    ) -> Result<(Option<Arc<Exp>>, bool)> {
        if filters.is_empty() {
            return Ok((None, false));
        }

        let mut needs_user = false;
        let mut exps: Vec<Exp> = Vec::with_capacity(filters.len());

        for v in filters {
            if v.as_str() == Some("false") {
                return Ok((Some(Arc::new(Exp::new(ExpOp::False))), false));
            }
            let node = json_to_node(v);
            exps.push(args::compile_where_node(self, ti, -1, &node, &mut needs_user)?);
        }

        let root = if exps.len() == 1 {
            exps.remove(0)
        } else {
            let mut and = Exp::new(ExpOp::And);
            for e in exps {
                and.push_child(e);
            }
            and
        };

        Ok((Some(Arc::new(root)), needs_user))
    }
}

fn find_role_table<'a>(
    tables: &'a [RoleTable],
    schema: &str,
    name: &str,
) -> Option<&'a RoleTable> {
    tables
        .iter()
        .find(|t| t.name == name && (t.schema.is_empty() || t.schema == schema))
}

/// Maps a JSON filter template into the parser's node shape. Strings with a
/// `$` sigil become variable references.
fn json_to_node(v: &serde_json::Value) -> Node {
    use crate::graph::NodeType;
    use serde_json::Value;

    match v {
        Value::Null => Node::label("null"),
        Value::Bool(b) => Node::bool(*b),
        Value::Number(n) => Node::num(&n.to_string()),
        Value::String(s) => match s.strip_prefix('$') {
            Some(var) => Node::var(var),
            None => Node::str(s),
        },
        Value::Array(items) => Node::list(items.iter().map(json_to_node)),
        Value::Object(map) => {
            let mut node = Node {
                node_type: NodeType::Obj,
                name: String::new(),
                val: String::new(),
                children: Vec::new(),
            };
            for (k, val) in map {
                let mut child = json_to_node(val);
                child.name = k.clone();
                node.children.push(child);
            }
            node
        }
    }
}
