use thiserror::Error;

/// Rejections produced while turning a filter expression into a predicate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid field name `{0}`")]
    InvalidField(String),

    #[error("`{0}__in` requires a non-empty list")]
    EmptyIn(String),

    #[error("`{0}__in` requires a list operand")]
    InRequiresList(String),

    #[error("`{0}__in` lists may not contain nulls or nested lists")]
    InvalidListElement(String),

    #[error("a list operand is only valid with `__in` (field `{0}`)")]
    UnexpectedList(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("invalid store usage: {0}")]
    Usage(String),

    #[error("unknown table `{0}`")]
    UnknownTable(String),

    #[error("table `{table}` has no field `{field}`")]
    UnknownField { table: String, field: String },

    #[error("field `{field}` is not {expected}")]
    Decode {
        field: String,
        expected: &'static str,
    },

    #[error("column `{column}` has unsupported type `{type_name}`")]
    UnsupportedColumn { column: String, type_name: String },

    #[error("{0} out of range")]
    OutOfRange(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
