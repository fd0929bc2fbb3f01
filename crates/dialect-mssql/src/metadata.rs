use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

use once_cell::sync::OnceCell;
use sqlshim_core::{ConfigError, Connection, MetadataError, Result, Row, Value};
use tracing::{debug, warn};

use crate::{
    catalog_queries,
    rewrite::{object_key, quote_identifier, unquote_identifier},
};

pub(crate) const DEFAULT_MSSQL_SCHEMA: &str = "dbo";

type ColumnsByTable = BTreeMap<String, BTreeSet<String>>;

/// Column facts the dialect needs before it can shape a statement.
///
/// Table and column names handed back are case-folded and unquoted.
/// Lookups that need the database go through `connection`, which is the
/// base connection the dialect wraps.
pub trait ColumnCatalog: Send + Sync {
    /// Columns of `table` that must be bound as large objects. Empty when the
    /// table has none or is unknown.
    fn lob_columns(&self, connection: &dyn Connection, table: &str) -> Result<BTreeSet<String>>;

    fn identity_column(&self, connection: &dyn Connection, table: &str) -> Result<Option<String>>;
}

/// Reads column metadata from the server catalog.
///
/// LOB columns for the whole schema are loaded by the first lookup and kept
/// for the lifetime of the catalog. Identity columns are loaded per table.
#[derive(Debug)]
pub struct CatalogMetadata {
    schema: String,
    lob_columns: OnceCell<ColumnsByTable>,
    identity_columns: Mutex<BTreeMap<String, Option<String>>>,
}

impl Default for CatalogMetadata {
    fn default() -> Self {
        Self::new(DEFAULT_MSSQL_SCHEMA)
    }
}

impl CatalogMetadata {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            lob_columns: OnceCell::new(),
            identity_columns: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn load_lob_columns(&self, connection: &dyn Connection) -> Result<ColumnsByTable> {
        let sql = catalog_queries::lob_columns_query(&self.schema);
        let rows = connection.fetch_all(&sql)?;

        let mut columns = ColumnsByTable::new();
        for row in &rows {
            let (Some(table_name), Some(column_name)) = (
                text_field(row, catalog_queries::TABLE_NAME_COLUMN),
                text_field(row, catalog_queries::COLUMN_NAME_COLUMN),
            ) else {
                warn!(schema = %self.schema, "skipping LOB catalog row without table/column names");
                continue;
            };
            columns
                .entry(object_key(table_name))
                .or_default()
                .insert(object_key(column_name));
        }

        debug!(
            schema = %self.schema,
            tables = columns.len(),
            "loaded LOB column catalog"
        );
        Ok(columns)
    }

    fn object_name(&self, table: &str) -> String {
        if table.contains('.') {
            quote_identifier(table)
        } else {
            quote_identifier(&format!("{}.{}", self.schema, unquote_identifier(table.trim())))
        }
    }
}

impl ColumnCatalog for CatalogMetadata {
    fn lob_columns(&self, connection: &dyn Connection, table: &str) -> Result<BTreeSet<String>> {
        let columns = self
            .lob_columns
            .get_or_try_init(|| self.load_lob_columns(connection))?;
        Ok(columns.get(&object_key(table)).cloned().unwrap_or_default())
    }

    fn identity_column(&self, connection: &dyn Connection, table: &str) -> Result<Option<String>> {
        let key = object_key(table);
        {
            let cache = self
                .identity_columns
                .lock()
                .map_err(|_| MetadataError::Poisoned)?;
            if let Some(cached) = cache.get(&key) {
                return Ok(cached.clone());
            }
        }

        let sql = catalog_queries::identity_column_query(&self.object_name(table));
        let rows = connection.fetch_all(&sql)?;
        let column = rows
            .first()
            .and_then(|row| text_field(row, catalog_queries::COLUMN_NAME_COLUMN))
            .map(object_key);

        debug!(table = %key, identity = ?column, "loaded identity column");
        self.identity_columns
            .lock()
            .map_err(|_| MetadataError::Poisoned)?
            .insert(key, column.clone());
        Ok(column)
    }
}

/// Column metadata supplied up front instead of read from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticMetadata {
    lob_columns: ColumnsByTable,
    identity_columns: BTreeMap<String, String>,
}

impl StaticMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_lob_column(mut self, table: &str, column: &str) -> Self {
        self.lob_columns
            .entry(object_key(table))
            .or_default()
            .insert(object_key(column));
        self
    }

    #[must_use]
    pub fn with_identity_column(mut self, table: &str, column: &str) -> Self {
        self.identity_columns
            .insert(object_key(table), object_key(column));
        self
    }

    /// Parses `table.column` lists such as `files.content, dbo.files.thumb`.
    pub fn from_column_lists(
        lob_columns: Option<&str>,
        identity_columns: Option<&str>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut metadata = Self::new();

        for (table, column) in parse_column_list(LOB_COLUMNS_KEY, lob_columns)? {
            metadata = metadata.with_lob_column(table, column);
        }
        for (table, column) in parse_column_list(IDENTITY_COLUMNS_KEY, identity_columns)? {
            metadata = metadata.with_identity_column(table, column);
        }

        Ok(metadata)
    }
}

impl ColumnCatalog for StaticMetadata {
    fn lob_columns(&self, _connection: &dyn Connection, table: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .lob_columns
            .get(&object_key(table))
            .cloned()
            .unwrap_or_default())
    }

    fn identity_column(&self, _connection: &dyn Connection, table: &str) -> Result<Option<String>> {
        Ok(self.identity_columns.get(&object_key(table)).cloned())
    }
}

pub(crate) const LOB_COLUMNS_KEY: &str = "mssql.lob_columns";
pub(crate) const IDENTITY_COLUMNS_KEY: &str = "mssql.identity_columns";

fn parse_column_list<'a>(
    key: &str,
    raw: Option<&'a str>,
) -> std::result::Result<Vec<(&'a str, &'a str)>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .rsplit_once('.')
                .filter(|(table, column)| !table.is_empty() && !column.is_empty())
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: entry.to_string(),
                    reason: "expected `table.column`",
                })
        })
        .collect()
}

fn text_field<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column)
        .and_then(Value::as_text)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
