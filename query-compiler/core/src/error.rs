use crate::qcode::QType;
use sqlgraph_schema::SchemaError;
use thiserror::Error;

/// Every way a compilation can fail. Message phrasing is part of the public
/// contract; hosts and tests match on it.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid graphql no query found")]
    NoQuery,

    #[error("invalid query: no selectors found")]
    NoSelectors,

    #[error("selector limit reached ({0})")]
    SelectorLimit(usize),

    #[error("table '{0}' blocked")]
    TableBlocked(String),

    #[error("{op} blocked: {field} (role: {role})")]
    OpBlocked { op: QType, field: String, role: String },

    #[error("union types are only valid with polymorphic relationships")]
    UnionWithoutParent,

    #[error("'{table}' is not a member of '{field}'")]
    NotUnionMember { table: String, field: String },

    #[error("no primary key column defined for '{0}'")]
    NoPrimaryKey(String),

    #[error("no fulltext indexes defined for table '{0}'")]
    NoFullTextIndex(String),

    #[error("no tsvector column defined on table '{0}'")]
    NoTsVectorColumn(String),

    #[error("value for argument '{arg}' must be a {want}")]
    ArgValue { arg: String, want: String },

    #[error("value must be a {0}")]
    ArgType(String),

    #[error("{db}: value for argument '{arg}' must be a {want}")]
    DbArgValue { db: String, arg: String, want: String },

    #[error("can only be specified at the query root")]
    IdNotAtRoot,

    #[error("value for argument '{0}' must be a variable named $cursor")]
    CursorVariable(String),

    #[error("selector '{0}' is not recursive")]
    FindNotRecursive(String),

    #[error("valid values 'parents' or 'children'")]
    FindValue,

    #[error("argument 'find' needed for recursive queries")]
    FindRequired,

    #[error("valid values for 'find' are 'parents' and 'children'")]
    FindInternalValue,

    #[error("valid values include asc, desc, asc_nulls_first and desc_nulls_first")]
    OrderValue,

    #[error("expecting a string, object or list")]
    OrderByInput,

    #[error("can only be defined once")]
    OrderByDefinedTwice,

    #[error(r#"valid format is [values, order] (eg. [$list, "desc"])"#)]
    OrderByListShape,

    #[error("duplicate column '{0}'")]
    OrderByDuplicate(String),

    #[error("expecting a list of strings or just a string")]
    DistinctInput,

    #[error("column '{0}' expects an expression object")]
    WhereNotObject(String),

    #[error("unknown operator '{0}'")]
    UnknownWhereOp(String),

    #[error("unknown column or relation '{name}' on table '{table}'")]
    UnknownWhereKey { table: String, name: String },

    #[error("'{0}' is not a db function")]
    NotDbFunction(String),

    #[error("db function '{0}' does not have any arguments")]
    FunctionNoInputs(String),

    #[error("db function '{func}' has no argument '{name}'")]
    FunctionUnknownParam { func: String, name: String },

    #[error("too many arguments for db function '{0}'")]
    FunctionTooManyArgs(String),

    #[error("mutations must contains one of the following arguments (insert, update, upsert or delete)")]
    MutationMissingAction,

    #[error("value for 'delete' must be 'true'")]
    DeleteNotTrue,

    #[error("unknown operation level directive: {0}")]
    UnknownOpDirective(String),

    #[error("no such selector level directive")]
    UnknownSelectorDirective,

    #[error("unknown field level directive: {0}")]
    UnknownFieldDirective(String),

    #[error("required argument '{0}' missing")]
    DirectiveMissingArg(String),

    #[error("required argument 'table' or 'column'")]
    ThroughMissingArg,

    #[error("required arguments 'src' and 'type'")]
    ValidationMissingArgs,

    #[error("validation script not set")]
    ValidationNoSource,

    #[error("validation type not set")]
    ValidationNoType,

    #[error("arguments 'if' or 'if_role' expected")]
    SkipIncludeArgs,

    #[error("invalid argument '{0}'")]
    InvalidArgument(String),

    #[error("invalid @constraint no variable name specified")]
    ConstraintNoVariable,

    #[error("value must be of type: {0}")]
    ConstraintType(String),

    #[error("{0}: {1}")]
    InArgument(String, #[source] Box<CompileError>),

    #[error("directive @{0}: {1}")]
    InDirective(String, #[source] Box<CompileError>),

    #[error("argument '{0}', {1}")]
    InOrderBy(String, #[source] Box<CompileError>),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
}

impl CompileError {
    pub(crate) fn in_argument(name: &str) -> impl FnOnce(CompileError) -> CompileError + '_ {
        move |err| CompileError::InArgument(name.to_string(), Box::new(err))
    }

    pub(crate) fn in_directive(name: &str) -> impl FnOnce(CompileError) -> CompileError + '_ {
        move |err| CompileError::InDirective(name.to_string(), Box::new(err))
    }
}

pub type Result<T, E = CompileError> = std::result::Result<T, E>;
