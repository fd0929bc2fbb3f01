use std::error::Error as StdError;

use thiserror::Error;

pub type BoxedError = Box<dyn StdError + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Execute(#[from] ExecutionError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("statement failed: {sql}: {source}")]
    StatementFailed {
        sql: String,
        #[source]
        source: BoxedError,
    },
}

impl ExecutionError {
    pub fn statement_failed<E>(sql: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::StatementFailed {
            sql: sql.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        match self {
            Self::StatementFailed { sql, .. } => sql,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("query builder has no FROM part")]
    MissingFrom,
    #[error("update of `{table}` has no columns to set")]
    EmptyUpdate { table: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("column catalog state was poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("connection config is missing `{field}`")]
    MissingField { field: &'static str },
    #[error("invalid value for `{key}`: `{value}` ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },
}
