use crate::{DbColumn, DbTable};

/// The closed set of relationship kinds between a selector's table and its
/// parent. Every site that inspects a relationship dispatches exhaustively
/// over this enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelKind {
    /// The table stands alone (roots, `@notRelated` lookups).
    #[default]
    None,
    /// The parent holds a scalar foreign key to the child; at most one row.
    OneToOne,
    /// The child holds the foreign key, or either side holds an array key.
    OneToMany,
    /// The child is a virtual table embedded in a parent column.
    Embedded,
    /// The parent names the child table in a discriminator column.
    Polymorphic,
    /// A self-join realised through a recursive CTE.
    Recursive,
    /// Resolved by a remote join pipeline, not by SQL.
    Remote,
    /// Relationship inference was suppressed for this selector.
    Skip,
}

/// One side of a relationship: the table and the column that participates
/// in the join.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelSide {
    pub ti: DbTable,
    pub col: DbColumn,
}

/// A resolved relationship. `left` is the child (selector) side except for
/// polymorphic relations, where it carries the parent's interface column
/// and `right` the referenced column of the concrete member table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbRel {
    pub kind: RelKind,
    pub left: RelSide,
    pub right: RelSide,
}

/// One edge of a relationship path returned by `DbSchema::find_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEdge {
    pub kind: RelKind,
    pub lt: DbTable,
    pub lcol: DbColumn,
    pub rt: DbTable,
    pub rcol: DbColumn,
}

/// Converts a path edge into the relationship record carried on selectors
/// and joins.
pub fn rel_from_path(edge: &PathEdge) -> DbRel {
    DbRel {
        kind: edge.kind,
        left: RelSide {
            ti: edge.lt.clone(),
            col: edge.lcol.clone(),
        },
        right: RelSide {
            ti: edge.rt.clone(),
            col: edge.rcol.clone(),
        },
    }
}
