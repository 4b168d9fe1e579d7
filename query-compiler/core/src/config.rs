//! Compiler configuration: defaults, feature toggles, per-table presets and
//! role-based access policies. Hosts usually deserialize this from their
//! config file.

use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default database schema for table lookups (`public` if unset).
    pub db_schema: String,
    /// Default row limit when neither the role nor the query sets one.
    pub default_limit: i32,
    /// Block tables that carry no explicit role policy.
    pub default_block: bool,
    /// Accept camelCase field names and map them to snake_case columns.
    pub enable_camelcase: bool,
    /// Classify selectors as singular when their field name is singular.
    pub enable_inflection: bool,
    pub roles: Vec<Role>,
    pub tables: Vec<TableCustom>,
}

/// Per-table customisation independent of roles.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableCustom {
    pub schema: String,
    pub name: String,
    /// Named order-by presets: preset key → `[column, direction]` pairs.
    /// A query selects one by passing a variable to `orderby`.
    pub order_by: IndexMap<String, Vec<(String, String)>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Role {
    pub name: String,
    pub tables: Vec<RoleTable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleTable {
    pub schema: String,
    pub name: String,
    pub query: Option<OpPolicy>,
    pub insert: Option<OpPolicy>,
    pub update: Option<OpPolicy>,
    pub upsert: Option<OpPolicy>,
    pub delete: Option<OpPolicy>,
}

/// Policy for one operation kind on one table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpPolicy {
    /// Row filter templates in the `where` grammar, conjoined. The string
    /// `"false"` denies all rows.
    pub filters: Vec<serde_json::Value>,
    pub limit: i32,
    pub block: bool,
}
