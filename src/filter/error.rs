use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),
}
