mod catalog_queries;
mod connection;
mod live;
mod metadata;
mod rewrite;

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use sqlshim_core::{Connection, ConnectionConfig, Dialect, MetadataError, Result};

pub use connection::MssqlConnection;
pub use live::LiveConnection;
pub use metadata::{CatalogMetadata, ColumnCatalog, StaticMetadata};

const SCHEMA_KEY: &str = "mssql.schema";

/// SQL Server dialect.
///
/// Server catalogs are owned by the dialect, one per schema, and shared by
/// every connection it opens or adapts, so column metadata is read from the
/// server at most once for the dialect's lifetime.
#[derive(Debug, Default)]
pub struct MssqlDialect {
    catalogs: Mutex<BTreeMap<String, Arc<CatalogMetadata>>>,
}

impl MssqlDialect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Column catalog selected by `config`: static lists when
    /// `mssql.lob_columns` or `mssql.identity_columns` is set, otherwise the
    /// shared server catalog for `mssql.schema` (default `dbo`).
    pub fn catalog_for(&self, config: &ConnectionConfig) -> Result<Arc<dyn ColumnCatalog>> {
        let lob_columns = config.extra_value(metadata::LOB_COLUMNS_KEY);
        let identity_columns = config.extra_value(metadata::IDENTITY_COLUMNS_KEY);

        if lob_columns.is_some() || identity_columns.is_some() {
            let metadata = StaticMetadata::from_column_lists(lob_columns, identity_columns)?;
            return Ok(Arc::new(metadata));
        }

        let schema = config
            .extra_value(SCHEMA_KEY)
            .unwrap_or(metadata::DEFAULT_MSSQL_SCHEMA);
        let mut catalogs = self.catalogs.lock().map_err(|_| MetadataError::Poisoned)?;
        let catalog = catalogs
            .entry(schema.to_lowercase())
            .or_insert_with(|| Arc::new(CatalogMetadata::new(schema)));
        let catalog: Arc<dyn ColumnCatalog> = catalog.clone();
        Ok(catalog)
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let live = LiveConnection::connect(config)?;
        Ok(Box::new(MssqlConnection::with_catalog(
            live,
            self.catalog_for(config)?,
        )))
    }

    fn adapt(
        &self,
        inner: Box<dyn Connection>,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>> {
        Ok(Box::new(MssqlConnection::with_catalog(
            inner,
            self.catalog_for(config)?,
        )))
    }
}
