//! The selector resolver and top-level compiler: breadth-first expansion of
//! the selection tree, relationship inference, role application, cursor
//! seek predicates and relationship filters.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use sqlgraph_schema::{rel_from_path, DbColumn, DbRel, DbSchema, DbTable, PathEdge, RelKind};

use crate::config::{Config, TableCustom};
use crate::error::{CompileError, Result};
use crate::graph::{self, FieldType, OpType};
use crate::qcode::role::RoleView;
use crate::qcode::{
    args, directives, fields, mutation, role, Exp, ExpOp, Join, Order, OrderBy, PagingType,
    QCode, QType, Select, SelType, SkipType, ValType, Variables,
};
use crate::util;

/// Hard cap on selectors per query; expansion fails beyond it.
pub const MAX_SELECTORS: usize = 100;

/// The designated role of unauthenticated callers.
pub(crate) const ANON_ROLE: &str = "anon";

/// The query compiler. Built once over an immutable schema and shared
/// freely between threads; `compile` is a pure function of its inputs.
pub struct Compiler {
    pub(crate) conf: Config,
    pub(crate) schema: Arc<DbSchema>,
    pub(crate) roles: RwLock<HashMap<String, Arc<RoleView>>>,
}

impl Compiler {
    pub fn new(schema: Arc<DbSchema>, mut conf: Config) -> Self {
        if conf.db_schema.is_empty() {
            conf.db_schema = "public".to_string();
        }
        Compiler {
            conf,
            schema,
            roles: RwLock::new(HashMap::new()),
        }
    }

    pub fn schema(&self) -> &Arc<DbSchema> {
        &self.schema
    }

    /// Compiles one parsed operation under the given role and variable
    /// environment.
    pub fn compile(&self, op: &graph::Operation, vars: Variables, role: &str) -> Result<QCode> {
        debug!(op = %op.name, %role, "compiling operation");

        let mut qc = QCode {
            name: op.name.clone(),
            qtype: QType::from(op.op_type),
            stype: QType::Query,
            vars,
            ..Default::default()
        };

        self.compile_query(&mut qc, op, role)?;
        Ok(qc)
    }

    fn compile_query(&self, qc: &mut QCode, op: &graph::Operation, role: &str) -> Result<()> {
        if op.fields.is_empty() {
            return Err(CompileError::NoQuery);
        }

        if op.op_type == OpType::Mutation {
            mutation::set_mutation_type(qc, op)?;
        }
        directives::compile_op_directives(qc, &op.directives)?;

        // Work items pack `field_id | parent_selector_id << 16`. Pushed in
        // reverse so the stack pops in document order.
        let mut st: Vec<i32> = Vec::new();
        for f in op.fields.iter().rev() {
            if f.parent_id == -1 {
                if f.name == "__typename" && !op.name.is_empty() {
                    qc.typename = true;
                }
                st.push(f.id | (-1i32 << 16));
            }
        }

        let mut id: i32 = 0;

        while let Some(val) = st.pop() {
            if id as usize >= MAX_SELECTORS {
                return Err(CompileError::SelectorLimit(MAX_SELECTORS));
            }

            let fid = (val & 0xFFFF) as usize;
            let mut parent_id = val >> 16;

            let field = &op.fields[fid];

            // Keyword companions (cursor fields, __typename) never become
            // selectors.
            if field.field_type == FieldType::Keyword || field.name == "__typename" {
                continue;
            }
            if field.parent_id == -1 {
                parent_id = -1;
            }

            let mut sel = Select {
                id,
                parent_id,
                ..Default::default()
            };

            let fname;
            let falias;
            if self.conf.enable_camelcase {
                falias = if field.alias.is_empty() {
                    field.name.clone()
                } else {
                    field.alias.clone()
                };
                fname = util::to_snake(&field.name);
            } else {
                falias = field.alias.clone();
                fname = field.name.clone();
            }
            sel.field_name = if falias.is_empty() {
                fname.clone()
            } else {
                falias.clone()
            };

            directives::compile_selector_directives_pre(&mut sel, &field.directives)?;

            self.add_rel_info(op, qc, &mut sel, field, &fname)?;

            // Remote relationships are handed to a separate pipeline; no
            // further compilation happens here.
            if sel.rel.kind == RelKind::Remote {
                qc.selects.push(sel);
                id += 1;
                continue;
            }

            directives::compile_selector_directives_post(self, &mut sel, &field.directives, role)?;

            let tr = self.selector_role(role, &fname, qc, &mut sel)?;
            self.set_limit(&tr, qc, &mut sel);

            args::compile_args(self, &mut sel, &field.args, role)?;
            fields::compile_fields(self, &mut st, op, &mut sel, field, role)?;

            // Role templates merge after user arguments.
            if role::add_role_filters(qc, &mut sel, &tr) && role == ANON_ROLE {
                sel.skip_render = SkipType::UserNeeded;
            }

            if sel.paging.cursor {
                // The tie-breaker column must come last in the order series.
                self.order_by_pk_col(&mut sel)?;
                if sel.paging.kind != PagingType::Offset {
                    add_seek_predicate(&mut sel);
                }
            }

            self.set_rel_filters(qc, &mut sel);
            validate_select(&sel)?;

            trace!(sel = sel.id, table = %sel.table, "selector compiled");
            qc.selects.push(sel);
            id += 1;
        }

        if id == 0 {
            return Err(CompileError::NoSelectors);
        }
        Ok(())
    }

    fn add_rel_info(
        &self,
        op: &graph::Operation,
        qc: &mut QCode,
        sel: &mut Select,
        field: &graph::Field,
        fname: &str,
    ) -> Result<()> {
        let mut psel_singular = false;

        if sel.parent_id == -1 {
            qc.roots.push(sel.id);
        } else {
            let psel = &mut qc.selects[sel.parent_id as usize];
            psel.children.push(sel.id);
            psel_singular = psel.singular;
        }

        // The names relationship inference runs over; member fragments skip
        // over their union field to its enclosing selection.
        let mut child_name = fname.to_string();
        let mut parent_fid = field.parent_id;

        match field.field_type {
            FieldType::Union => {
                sel.sel_type = SelType::Union;
                if sel.parent_id == -1 {
                    return Err(CompileError::UnionWithoutParent);
                }
            }
            FieldType::Member => {
                if sel.parent_id == -1 || field.parent_id == -1 {
                    return Err(CompileError::UnionWithoutParent);
                }
                sel.sel_type = SelType::Member;
                sel.singular = psel_singular;

                let union_f = &op.fields[field.parent_id as usize];
                child_name = self.normalize(&union_f.name);
                parent_fid = union_f.parent_id;
            }
            _ => {}
        }

        if sel.rel.kind == RelKind::Skip {
            sel.rel = DbRel::default();
        } else if sel.parent_id != -1 && parent_fid != -1 {
            let parent_f = &op.fields[parent_fid as usize];
            let parent_name = self.normalize(&parent_f.name);

            let path = self.find_path(&child_name, &parent_name, &sel.through)?;
            sel.rel = rel_from_path(&path[0]);

            // Trailing edges pass through join tables; only the outermost
            // join binds to the actual parent selector.
            let rpath = &path[1..];
            for (i, p) in rpath.iter().enumerate().rev() {
                let rel = rel_from_path(p);
                let pid = if i == rpath.len() - 1 { sel.parent_id } else { -1 };
                let filter = build_filter(&rel, pid);
                sel.joins.push(Join {
                    rel,
                    filter,
                    local: false,
                });
            }
        }

        if sel.parent_id == -1 || matches!(sel.rel.kind, RelKind::Polymorphic | RelKind::None) {
            let schema = if sel.schema.is_empty() {
                self.conf.db_schema.as_str()
            } else {
                sel.schema.as_str()
            };
            sel.ti = self.find(schema, fname)?;
        } else {
            sel.ti = sel.rel.left.ti.clone();
        }

        if sel.ti.blocked {
            return Err(CompileError::TableBlocked(fname.to_string()));
        }

        if sel.sel_type == SelType::Member && sel.rel.kind == RelKind::Polymorphic {
            if let Some(def) = self
                .schema
                .union_def(&sel.rel.left.ti.name, &child_name)
            {
                if !def.members.is_empty() && !def.members.contains(&sel.ti.name) {
                    return Err(CompileError::NotUnionMember {
                        table: sel.ti.name.clone(),
                        field: child_name,
                    });
                }
            }
        }

        sel.table = sel.ti.name.clone();
        sel.tc = self.table_custom(&sel.ti.schema, &sel.ti.name);

        if sel.rel.kind == RelKind::Remote {
            sel.table = fname.to_string();
            sel.skip_render = SkipType::Remote;
            qc.remotes += 1;
            return Ok(());
        }

        self.set_singular(fname, sel);
        Ok(())
    }

    fn set_singular(&self, field_name: &str, sel: &mut Select) {
        if sel.singular {
            return;
        }
        if self.conf.enable_inflection && util::is_singular(field_name) {
            sel.singular = true;
            return;
        }
        if !sel.joins.is_empty() {
            return;
        }
        // A parent-held scalar key pins one row; polymorphic members always
        // resolve against a single parent row.
        if matches!(sel.rel.kind, RelKind::OneToOne | RelKind::Polymorphic) {
            sel.singular = true;
        }
    }

    fn selector_role(
        &self,
        role: &str,
        field_name: &str,
        qc: &QCode,
        sel: &mut Select,
    ) -> Result<Arc<RoleView>> {
        let tr = self.role_view(role, &sel.ti.schema, &sel.ti.name, field_name, &sel.ti)?;

        if tr.is_blocked(qc.stype) {
            if qc.stype != QType::Query {
                return Err(CompileError::OpBlocked {
                    op: qc.stype,
                    field: field_name.to_string(),
                    role: role.to_string(),
                });
            }
            sel.skip_render = SkipType::Blocked;
        }
        Ok(tr)
    }

    fn set_limit(&self, tr: &RoleView, qc: &QCode, sel: &mut Select) {
        if sel.paging.limit != 0 {
            return;
        }
        let limit = tr.limit(qc.stype);
        if limit != 0 {
            sel.paging.limit = limit;
        } else if self.conf.default_limit != 0 {
            sel.paging.limit = self.conf.default_limit;
        } else {
            sel.paging.limit = 20;
        }
    }

    /// Appends the primary key as the cursor tie-breaker, following the
    /// scan direction `first`/`last` recorded.
    fn order_by_pk_col(&self, sel: &mut Select) -> Result<()> {
        let pk = sel
            .ti
            .primary_col
            .clone()
            .ok_or_else(|| CompileError::NoPrimaryKey(sel.table.clone()))?;

        if sel.order_by.iter().any(|ob| ob.col.name == pk.name) {
            return Ok(());
        }

        let order = match sel.order {
            Order::Desc | Order::DescNullsFirst | Order::DescNullsLast => Order::Desc,
            _ => Order::Asc,
        };
        sel.order_by.push(OrderBy {
            col: pk,
            order,
            ..Default::default()
        });
        Ok(())
    }

    /// Attaches the join predicate linking this selector's table to its
    /// parent.
    fn set_rel_filters(&self, qc: &QCode, sel: &mut Select) {
        let rel = sel.rel.clone();
        let mut pid = sel.parent_id;

        // With an explicit join chain the parent is reached through the
        // joins, not directly.
        if !sel.joins.is_empty() {
            pid = -1;
        }

        match rel.kind {
            RelKind::OneToOne | RelKind::OneToMany | RelKind::Embedded => {
                if let Some(filter) = build_filter(&rel, pid) {
                    sel.filter.set_shared(filter);
                }
            }

            RelKind::Polymorphic => {
                // The member's real parent is the grandparent selector; the
                // middle selector is the interface discriminator.
                let pid = qc.selects[sel.parent_id as usize].parent_id;
                let mut and = Exp::new(ExpOp::And);

                let mut ex1 = Exp::new(ExpOp::Eq);
                ex1.left.table = sel.ti.name.clone();
                ex1.left.col = rel.right.col.clone();
                ex1.right.sel_id = pid;
                ex1.right.col = rel.left.col.clone();

                let mut ex2 = Exp::new(ExpOp::Eq);
                ex2.left.sel_id = pid;
                ex2.left.col = DbColumn::named(&rel.left.col.table, &rel.left.col.fk_col);
                ex2.right.val_type = Some(ValType::Str);
                ex2.right.val = sel.ti.name.clone();

                and.push_child(ex1);
                and.push_child(ex2);
                sel.filter.set(and);
            }

            RelKind::Recursive => {
                let ex = recursive_filter(sel, &rel);
                sel.filter.set(ex);
            }

            _ => {}
        }
    }

    pub(crate) fn find(&self, schema: &str, name: &str) -> Result<DbTable> {
        Ok(self.schema.find(schema, util::strip_by_id(name))?)
    }

    pub(crate) fn find_path(&self, from: &str, to: &str, through: &str) -> Result<Vec<PathEdge>> {
        Ok(self
            .schema
            .find_path(util::strip_by_id(from), util::strip_by_id(to), through)?)
    }

    pub(crate) fn normalize(&self, name: &str) -> String {
        if self.conf.enable_camelcase {
            util::to_snake(name)
        } else {
            name.to_string()
        }
    }

    fn table_custom(&self, schema: &str, name: &str) -> Option<TableCustom> {
        self.conf
            .tables
            .iter()
            .find(|t| t.name == name && (t.schema.is_empty() || t.schema == schema))
            .cloned()
    }
}

/// Builds the equality (or containment, when one side is an array) binding
/// a relationship's two sides. `pid` anchors the parent side to a selector.
pub(crate) fn build_filter(rel: &DbRel, pid: i32) -> Option<Arc<Exp>> {
    match rel.kind {
        RelKind::OneToOne | RelKind::OneToMany => {
            let left = &rel.left.col;
            let right = &rel.right.col;
            let mut ex = Exp::default();

            if !left.array && right.array {
                ex.op = ExpOp::In;
                ex.left.col = left.clone();
                ex.right.sel_id = pid;
                ex.right.col = right.clone();
            } else if left.array && !right.array {
                ex.op = ExpOp::In;
                ex.left.sel_id = pid;
                ex.left.col = right.clone();
                ex.right.col = left.clone();
            } else {
                ex.op = ExpOp::Eq;
                ex.left.col = left.clone();
                ex.right.sel_id = pid;
                ex.right.col = right.clone();
            }
            Some(Arc::new(ex))
        }

        RelKind::Embedded => {
            let mut ex = Exp::new(ExpOp::Eq);
            ex.left.col = rel.right.col.clone();
            ex.right.sel_id = pid;
            ex.right.col = rel.right.col.clone();
            Some(Arc::new(ex))
        }

        _ => None,
    }
}

/// The recursion-frame predicates: a non-null key, an anti-visit guard
/// against cycles, and the step linking each row to the next frame. The
/// `find` direction decides which side is "self" and which is "next".
fn recursive_filter(sel: &Select, rel: &DbRel) -> Exp {
    let rcte = format!("__rcte_{}", rel.right.ti.name);
    let lcol = &rel.left.col;
    let rcol = &rel.right.col;

    let mut and = Exp::new(ExpOp::And);
    let mut ex1 = Exp::new(ExpOp::IsNotNull);
    let mut ex2 = Exp::default();
    let mut ex3 = Exp::default();

    let find = sel
        .internal_arg("find")
        .map(|a| a.val.clone())
        .unwrap_or_default();

    match find.as_str() {
        "parents" | "parent" => {
            ex1.left.table = rcte.clone();
            ex1.left.col = lcol.clone();

            if !lcol.array && rcol.array {
                ex2.op = ExpOp::NotIn;
                ex2.left.table = rcte.clone();
                ex2.left.col = lcol.clone();
                ex2.right.table = rcte.clone();
                ex2.right.col = rcol.clone();

                ex3.op = ExpOp::In;
                ex3.left.table = rcte;
                ex3.left.col = lcol.clone();
                ex3.right.col = rcol.clone();
            } else if lcol.array && !rcol.array {
                ex2.op = ExpOp::NotIn;
                ex2.left.table = rcte.clone();
                ex2.left.col = rcol.clone();
                ex2.right.table = rcte.clone();
                ex2.right.col = lcol.clone();

                ex3.op = ExpOp::In;
                ex3.left.col = rcol.clone();
                ex3.right.table = rcte;
                ex3.right.col = lcol.clone();
            } else {
                ex2.op = ExpOp::NotEq;
                ex2.left.table = rcte.clone();
                ex2.left.col = lcol.clone();
                ex2.right.table = rcte.clone();
                ex2.right.col = rcol.clone();

                ex3.op = ExpOp::Eq;
                ex3.left.col = rcol.clone();
                ex3.right.table = rcte;
                ex3.right.col = lcol.clone();
            }
        }

        _ => {
            ex1.left.col = lcol.clone();

            if !lcol.array && rcol.array {
                ex2.op = ExpOp::NotIn;
                ex2.left.col = lcol.clone();
                ex2.right.col = rcol.clone();

                ex3.op = ExpOp::In;
                ex3.left.col = lcol.clone();
                ex3.right.table = rcte;
                ex3.right.col = rcol.clone();
            } else if lcol.array && !rcol.array {
                ex2.op = ExpOp::NotIn;
                ex2.left.col = rcol.clone();
                ex2.right.col = lcol.clone();

                ex3.op = ExpOp::In;
                ex3.left.table = rcte;
                ex3.left.col = rcol.clone();
                ex3.right.col = lcol.clone();
            } else {
                ex2.op = ExpOp::NotEq;
                ex2.left.col = lcol.clone();
                ex2.right.col = rcol.clone();

                ex3.op = ExpOp::Eq;
                ex3.left.col = lcol.clone();
                ex3.right.table = rcte;
                ex3.right.col = rcol.clone();
            }
        }
    }

    and.push_child(ex1);
    and.push_child(ex2);
    and.push_child(ex3);
    and
}

/// Synthesises the lexicographic seek predicate over the order-by list.
///
/// For an order by `(A, B, C)` against the cursor row:
/// ```text
/// (__cur.A IS NULL)
///   OR (A > __cur.A)
///   OR (A = __cur.A AND B > __cur.B)
///   OR (A = __cur.A AND B = __cur.B AND C > __cur.C)
/// ```
/// with `<` in place of `>` for descending columns.
fn add_seek_predicate(sel: &mut Select) {
    let ob_len = sel.order_by.len();
    if ob_len == 0 {
        return;
    }

    let mut or = Exp::new(ExpOp::Or);

    let mut isnull = Exp::new(ExpOp::IsNull);
    isnull.left.table = "__cur".to_string();
    isnull.left.col = sel.order_by[0].col.clone();
    or.push_child(isnull);

    for i in 0..ob_len {
        let mut and = if i != 0 {
            Some(Exp::new(ExpOp::And))
        } else {
            None
        };

        for (n, ob) in sel.order_by.iter().enumerate() {
            if n > i {
                break;
            }

            let mut f = Exp::default();
            f.left.col = ob.col.clone();
            f.right.table = "__cur".to_string();
            f.right.col = ob.col.clone();

            f.op = if i > 0 && n != i {
                ExpOp::Eq
            } else if matches!(
                ob.order,
                Order::Desc | Order::DescNullsFirst | Order::DescNullsLast
            ) {
                ExpOp::Lt
            } else {
                ExpOp::Gt
            };

            match &mut and {
                Some(a) => a.push_child(f),
                None => or.push_child(f),
            }
        }

        if let Some(a) = and.take() {
            or.push_child(a);
        }
    }

    sel.filter.set(or);
}

fn validate_select(sel: &Select) -> Result<()> {
    if sel.rel.kind == RelKind::Recursive {
        let arg = sel.internal_arg("find").ok_or(CompileError::FindRequired)?;
        if arg.val != "parents" && arg.val != "children" {
            return Err(CompileError::FindInternalValue);
        }
    }
    Ok(())
}
