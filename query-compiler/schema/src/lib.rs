//! The relational-schema model the query compiler resolves identifier names
//! against: tables, columns, table functions, and the relationship graph
//! used to infer the join path between a nested selection and its parent.
//!
//! A `DbSchema` is built once at process start (normally by a database
//! introspector, by hand in tests) and shared immutably across all
//! compilations.

mod relationship;
mod table;

pub use relationship::{rel_from_path, DbRel, PathEdge, RelKind, RelSide};
pub use table::{ColumnSpec, DbColumn, DbFuncParam, DbFunction, DbTable, TableKind};

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table not found: '{0}'")]
    TableNotFound(String),

    #[error("column '{1}' not found on table '{0}'")]
    ColumnNotFound(String, String),

    #[error("db function not found: '{0}'")]
    FunctionNotFound(String),

    #[error("no relationship found between '{0}' and '{1}'")]
    NoPath(String, String),

    #[error("multiple relationship paths found between '{0}' and '{1}', specify one with @through")]
    AmbiguousPath(String, String),
}

/// A polymorphic interface declared on a parent table: `id_col` holds the
/// member row's key, `type_col` names the member table, `ref_col` is the
/// column of the member table the key refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionDef {
    pub id_col: String,
    pub type_col: String,
    pub ref_col: String,
    /// Concrete member tables. Empty accepts any table.
    pub members: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DbSchema {
    db_type: String,
    tables: Vec<DbTable>,
    aliases: HashMap<String, String>,
    unions: HashMap<(String, String), UnionDef>,
    embeds: HashMap<(String, String), (DbTable, String)>,
    remotes: HashMap<(String, String), String>,
    functions: HashMap<String, DbFunction>,
}

impl DbSchema {
    pub fn new(db_type: &str) -> Self {
        DbSchema {
            db_type: db_type.to_string(),
            ..Default::default()
        }
    }

    /// The database dialect tag, e.g. `"postgres"` or `"mysql"`.
    pub fn db_type(&self) -> &str {
        &self.db_type
    }

    pub fn add_table(&mut self, mut table: DbTable) {
        table.finalize();
        if let Some(func) = &table.func {
            self.functions.insert(func.name.clone(), func.clone());
        }
        self.tables.push(table);
    }

    /// Registers an alternate name a query may use for an existing table.
    /// A table aliased to itself is how self-recursive fields (`thread` on
    /// `reply`) are exposed.
    pub fn add_alias(&mut self, alias: &str, table: &str) {
        self.aliases.insert(alias.to_string(), table.to_string());
    }

    /// Declares a polymorphic interface field on `table`. The field name
    /// also becomes a virtual table so union selectors resolve by name.
    pub fn add_union(&mut self, table: &str, field: &str, def: UnionDef) {
        if !self.tables.iter().any(|t| t.name == field) {
            let schema = self
                .tables
                .iter()
                .find(|t| t.name == table)
                .map(|t| t.schema.clone())
                .unwrap_or_default();
            let mut vt = DbTable::new(&schema, field);
            vt.kind = TableKind::Virtual;
            self.tables.push(vt);
        }
        self.unions.insert((table.to_string(), field.to_string()), def);
    }

    /// Declares a virtual table embedded in a column of `parent`.
    pub fn add_embedded(&mut self, parent: &str, col: &str, mut virtual_table: DbTable) {
        virtual_table.kind = TableKind::Virtual;
        virtual_table.finalize();
        self.embeds.insert(
            (parent.to_string(), virtual_table.name.clone()),
            (virtual_table, col.to_string()),
        );
    }

    /// Declares a field on `table` that resolves through a remote join
    /// pipeline instead of SQL.
    pub fn add_remote(&mut self, table: &str, field: &str) {
        self.remotes
            .insert((table.to_string(), field.to_string()), field.to_string());
    }

    pub fn add_function(&mut self, func: DbFunction) {
        self.functions.insert(func.name.clone(), func.clone());
    }

    pub fn function(&self, name: &str) -> Option<&DbFunction> {
        self.functions.get(name)
    }

    pub fn union_def(&self, table: &str, field: &str) -> Option<&UnionDef> {
        self.unions.get(&(table.to_string(), field.to_string()))
    }

    fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Looks a table up by name. An exact `(schema, name)` match wins; a
    /// name unique across schemas is accepted without one.
    pub fn find(&self, schema: &str, name: &str) -> Result<DbTable, SchemaError> {
        let name = self.resolve_alias(name);

        if let Some(t) = self
            .tables
            .iter()
            .find(|t| t.schema == schema && t.name == name)
        {
            return Ok(t.clone());
        }

        let mut matches = self.tables.iter().filter(|t| t.name == name);
        match (matches.next(), matches.next()) {
            (Some(t), None) => Ok(t.clone()),
            _ => Err(SchemaError::TableNotFound(format!("{schema}.{name}"))),
        }
    }

    /// Resolves the relationship path that joins `from` (the child field) to
    /// `to` (the parent table). The first edge is the child's primary
    /// relationship; trailing edges pass through intermediate join tables.
    /// `through` disambiguates by foreign-key column or join-table name.
    pub fn find_path(
        &self,
        from: &str,
        to: &str,
        through: &str,
    ) -> Result<Vec<PathEdge>, SchemaError> {
        let to_table = self.resolve_alias(to);

        // Polymorphic interface fields and remote joins are declared on the
        // parent and keyed by the queried field name.
        if let Some(def) = self.unions.get(&(to_table.to_string(), from.to_string())) {
            return Ok(vec![self.union_edge(to_table, def)?]);
        }

        if self.remotes.contains_key(&(to_table.to_string(), from.to_string())) {
            let parent = self.find("", to_table)?;
            let pk = parent.primary_col.clone().unwrap_or_default();
            let mut lt = DbTable::new(&parent.schema, from);
            lt.kind = TableKind::Virtual;
            return Ok(vec![PathEdge {
                kind: RelKind::Remote,
                lcol: pk.clone(),
                lt,
                rt: parent,
                rcol: pk,
            }]);
        }

        if let Some((vt, col)) = self.embeds.get(&(to_table.to_string(), from.to_string())) {
            let parent = self.find("", to_table)?;
            let rcol = parent.column(col)?;
            return Ok(vec![PathEdge {
                kind: RelKind::Embedded,
                lt: vt.clone(),
                lcol: DbColumn::default(),
                rt: parent,
                rcol,
            }]);
        }

        let from_t = self.find("", from)?;
        let to_t = self.find("", to)?;

        if from_t.name == to_t.name {
            return Ok(vec![self.recursive_edge(&from_t)?]);
        }

        let mut direct = self.direct_edges(&from_t, &to_t);

        if !through.is_empty() {
            // `through` either picks one of several foreign keys by column
            // name or forces the path through a named join table.
            direct.retain(|e| e.lcol.name == through || e.rcol.name == through);
            if let Some(edge) = direct.pop() {
                return Ok(vec![edge]);
            }
            let hops = self.two_hop_paths(&from_t, &to_t, Some(through));
            return match hops.len() {
                1 => Ok(hops.into_iter().next().unwrap_or_default()),
                _ => Err(SchemaError::NoPath(from.to_string(), to.to_string())),
            };
        }

        match direct.len() {
            1 => return Ok(vec![direct.remove(0)]),
            0 => {}
            _ => {
                return Err(SchemaError::AmbiguousPath(
                    from.to_string(),
                    to.to_string(),
                ))
            }
        }

        let hops = self.two_hop_paths(&from_t, &to_t, None);
        match hops.len() {
            1 => Ok(hops.into_iter().next().unwrap_or_default()),
            0 => Err(SchemaError::NoPath(from.to_string(), to.to_string())),
            _ => Err(SchemaError::AmbiguousPath(
                from.to_string(),
                to.to_string(),
            )),
        }
    }

    fn union_edge(&self, parent: &str, def: &UnionDef) -> Result<PathEdge, SchemaError> {
        let parent_t = self.find("", parent)?;
        let mut lcol = parent_t.column(&def.id_col)?;
        // The discriminator rides in the fk_col slot of the interface column.
        lcol.fk_table.clear();
        lcol.fk_col = def.type_col.clone();

        let rcol = DbColumn {
            name: def.ref_col.clone(),
            ..Default::default()
        };

        Ok(PathEdge {
            kind: RelKind::Polymorphic,
            lt: parent_t,
            lcol,
            rt: DbTable::default(),
            rcol,
        })
    }

    fn recursive_edge(&self, table: &DbTable) -> Result<PathEdge, SchemaError> {
        let fk = table
            .columns
            .iter()
            .find(|c| c.fk_table == table.name)
            .cloned()
            .ok_or_else(|| SchemaError::NoPath(table.name.clone(), table.name.clone()))?;
        let rcol = table.column(&fk.fk_col)?;

        Ok(PathEdge {
            kind: RelKind::Recursive,
            lt: table.clone(),
            lcol: fk,
            rt: table.clone(),
            rcol,
        })
    }

    /// All single-edge relationships between two tables, child side first.
    fn direct_edges(&self, from_t: &DbTable, to_t: &DbTable) -> Vec<PathEdge> {
        let mut edges = Vec::new();

        // Child holds the foreign key: one row of `to` fans out to many
        // rows of `from`.
        for col in from_t.columns.iter().filter(|c| c.fk_table == to_t.name) {
            if let Ok(rcol) = to_t.column(&col.fk_col) {
                edges.push(PathEdge {
                    kind: RelKind::OneToMany,
                    lt: from_t.clone(),
                    lcol: col.clone(),
                    rt: to_t.clone(),
                    rcol,
                });
            }
        }

        // Parent holds the foreign key: an array key still reaches many
        // child rows, a scalar key pins exactly one.
        for col in to_t.columns.iter().filter(|c| c.fk_table == from_t.name) {
            if let Ok(lcol) = from_t.column(&col.fk_col) {
                edges.push(PathEdge {
                    kind: if col.array {
                        RelKind::OneToMany
                    } else {
                        RelKind::OneToOne
                    },
                    lt: from_t.clone(),
                    lcol,
                    rt: to_t.clone(),
                    rcol: col.clone(),
                });
            }
        }

        edges
    }

    fn two_hop_paths(
        &self,
        from_t: &DbTable,
        to_t: &DbTable,
        through: Option<&str>,
    ) -> Vec<Vec<PathEdge>> {
        let mut paths = Vec::new();

        for mid in &self.tables {
            if mid.name == from_t.name || mid.name == to_t.name {
                continue;
            }
            if let Some(t) = through {
                if mid.name != t {
                    continue;
                }
            }

            let first = self.direct_edges(from_t, mid);
            let second = self.direct_edges(mid, to_t);
            if let (Some(e1), Some(e2)) = (first.first(), second.first()) {
                paths.push(vec![e1.clone(), e2.clone()]);
            }
        }

        paths
    }
}
