mod builder;
mod config;
mod connection;
mod dialect;
mod error;
mod request;
mod select;
mod value;

pub use builder::{QueryBuilder, QueryPart, SortOrder};
pub use config::ConnectionConfig;
pub use connection::{Connection, build_insert, build_update, quote_literal};
pub use dialect::Dialect;
pub use error::{
    BoxedError, BuildError, ConfigError, Error, ExecutionError, MetadataError, Result,
};
pub use request::{Mutation, Query};
pub use select::SelectRequest;
pub use value::{ColumnTypes, ParameterType, Row, Value};
