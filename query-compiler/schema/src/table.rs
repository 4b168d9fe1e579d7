use crate::SchemaError;

/// A database column as seen by the compiler. Foreign-key metadata uses
/// empty strings for "absent" so column values can be moved into expression
/// nodes without unwrapping.
///
/// For columns backing a polymorphic interface, `fk_col` names the sibling
/// discriminator column instead of a referenced column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbColumn {
    pub table: String,
    pub name: String,
    pub col_type: String,
    pub primary_key: bool,
    pub not_null: bool,
    pub array: bool,
    pub full_text: bool,
    pub fk_table: String,
    pub fk_col: String,
}

impl DbColumn {
    pub fn named(table: &str, name: &str) -> Self {
        DbColumn {
            table: table.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn has_fk(&self) -> bool {
        !self.fk_table.is_empty()
    }
}

/// An input parameter of a database function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbFuncParam {
    pub name: String,
    pub param_type: String,
}

/// A database function. Table functions carry their full signature; scalar
/// functions only need a name and return type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbFunction {
    pub schema: String,
    pub name: String,
    pub return_type: String,
    pub inputs: Vec<DbFuncParam>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableKind {
    #[default]
    Table,
    Function,
    Virtual,
}

/// A table (or table-valued function) in the compiler's schema view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbTable {
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<DbColumn>,
    pub primary_col: Option<DbColumn>,
    pub full_text: Vec<DbColumn>,
    pub blocked: bool,
    pub func: Option<DbFunction>,
}

impl DbTable {
    pub fn new(schema: &str, name: &str) -> Self {
        DbTable {
            schema: schema.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builds a table wrapping a table-valued function.
    pub fn function(schema: &str, func: DbFunction) -> Self {
        DbTable {
            schema: schema.to_string(),
            name: func.name.clone(),
            kind: TableKind::Function,
            func: Some(func),
            ..Default::default()
        }
    }

    pub fn with_column(mut self, col: DbColumn) -> Self {
        self.columns.push(col);
        self
    }

    pub fn is_function(&self) -> bool {
        self.kind == TableKind::Function
    }

    pub fn column(&self, name: &str) -> Result<DbColumn, SchemaError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| SchemaError::ColumnNotFound(self.name.clone(), name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Normalises the table after construction: stamps the owning table name
    /// onto every column and derives the primary-key and full-text lookups.
    pub(crate) fn finalize(&mut self) {
        for col in &mut self.columns {
            col.table = self.name.clone();
        }
        self.primary_col = self.columns.iter().find(|c| c.primary_key).cloned();
        self.full_text = self.columns.iter().filter(|c| c.full_text).cloned().collect();
    }
}

/// Column builder helpers used by hosts and tests when assembling a schema
/// by hand.
#[derive(Debug, Default)]
pub struct ColumnSpec(DbColumn);

impl ColumnSpec {
    pub fn new(name: &str, col_type: &str) -> Self {
        ColumnSpec(DbColumn {
            name: name.to_string(),
            col_type: col_type.to_string(),
            ..Default::default()
        })
    }

    pub fn primary(mut self) -> Self {
        self.0.primary_key = true;
        self.0.not_null = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.0.not_null = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.0.array = true;
        self
    }

    pub fn full_text(mut self) -> Self {
        self.0.full_text = true;
        self
    }

    pub fn references(mut self, table: &str, col: &str) -> Self {
        self.0.fk_table = table.to_string();
        self.0.fk_col = col.to_string();
        self
    }

    pub fn build(self) -> DbColumn {
        self.0
    }
}

impl From<ColumnSpec> for DbColumn {
    fn from(spec: ColumnSpec) -> Self {
        spec.build()
    }
}
