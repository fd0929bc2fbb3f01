use std::sync::Arc;

use sqlshim_core::{
    ColumnTypes, Connection, Mutation, ParameterType, Query, QueryBuilder, QueryPart, Result, Row,
    SelectRequest, Value,
};
use tracing::{debug, warn};

use crate::{
    catalog_queries,
    metadata::{CatalogMetadata, ColumnCatalog},
    rewrite,
};

/// A base connection adapted to SQL Server.
///
/// Statements are reshaped between the `prepare_*` step and execution:
///
/// - inserts that supply an explicit identity value run with
///   `IDENTITY_INSERT` switched on for that table;
/// - inserts and updates bind VARBINARY/IMAGE columns as large objects;
/// - a grouping on nothing but `[table].[uid]` becomes `SELECT DISTINCT`;
/// - remaining grouping lists absorb every sort column.
///
/// Everything else is delegated to the wrapped connection unchanged.
pub struct MssqlConnection<C> {
    inner: C,
    catalog: Arc<dyn ColumnCatalog>,
}

impl<C> MssqlConnection<C>
where
    C: Connection,
{
    /// Wraps `inner` with a catalog that reads metadata from the server.
    pub fn new(inner: C) -> Self {
        Self::with_catalog(inner, Arc::new(CatalogMetadata::default()))
    }

    /// Wraps `inner` with a caller-owned catalog, which may be shared
    /// between connections so metadata is loaded once.
    pub fn with_catalog(inner: C, catalog: Arc<dyn ColumnCatalog>) -> Self {
        Self { inner, catalog }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    fn with_lob_types(&self, table: &str, data: &Row, types: &ColumnTypes) -> Result<ColumnTypes> {
        let mut types = types.clone();
        let lob_columns = self.catalog.lob_columns(&self.inner, table)?;
        if lob_columns.is_empty() {
            return Ok(types);
        }

        for column in data.keys() {
            if lob_columns.contains(&rewrite::object_key(column)) {
                debug!(table, column = %column, "binding column as large object");
                types.insert(column.clone(), ParameterType::LargeObject);
            }
        }

        Ok(types)
    }

    fn supplies_identity(&self, table: &str, data: &Row) -> Result<bool> {
        let Some(identity) = self.catalog.identity_column(&self.inner, table)? else {
            return Ok(false);
        };

        Ok(data
            .iter()
            .any(|(column, value)| !value.is_null() && rewrite::object_key(column) == identity))
    }
}

impl<C> Connection for MssqlConnection<C>
where
    C: Connection,
{
    fn execute_update(&self, mutation: Mutation) -> Result<u64> {
        if mutation.has_pending_sql() {
            return self.inner.execute_update(mutation.into_rendered());
        }
        self.inner.execute_update(mutation)
    }

    fn execute_query(&self, query: Query) -> Result<Vec<Row>> {
        if !query.is_distinct() {
            return self.inner.execute_query(query);
        }

        let sql = match rewrite::apply_distinct(query.sql()) {
            Some(sql) => {
                debug!(sql = %sql, "rewrote grouping as SELECT DISTINCT");
                sql
            }
            None => {
                if !rewrite::is_select_distinct(query.sql()) {
                    warn!(
                        sql = %query.sql(),
                        "distinct request dropped: statement does not start with SELECT"
                    );
                }
                query.sql().to_string()
            }
        };
        self.inner.execute_query(query.with_rewritten_sql(sql))
    }

    /// Base quoting coerced to text; callers composing SQL expressions
    /// require a textual literal even for numbers.
    fn quote(&self, value: &Value, parameter_type: ParameterType) -> Result<Value> {
        let quoted = self.inner.quote(value, parameter_type)?;
        Ok(match quoted {
            Value::Text(text) => Value::Text(text),
            other => Value::Text(other.to_text()),
        })
    }

    fn last_insert_id(&self, name: Option<&str>) -> Result<String> {
        let sql = name.map_or_else(
            || catalog_queries::SESSION_IDENTITY_QUERY.to_string(),
            catalog_queries::ident_current_query,
        );
        let rows = self.inner.fetch_all(&sql)?;

        Ok(rows
            .first()
            .and_then(|row| row.get(catalog_queries::IDENTITY_VALUE_COLUMN))
            .map(Value::to_text)
            .unwrap_or_default())
    }

    fn prepare_insert(&self, table: &str, data: &Row, types: &ColumnTypes) -> Result<Mutation> {
        let types = self.with_lob_types(table, data, types)?;
        let mutation = self.inner.prepare_insert(table, data, &types)?;

        if !self.supplies_identity(table, data)? {
            return Ok(mutation);
        }

        debug!(table, "inserting explicit identity value");
        Ok(mutation
            .with_prelude(rewrite::identity_insert_prelude(table))
            .with_postlude(rewrite::identity_insert_postlude(table)))
    }

    fn prepare_update(
        &self,
        table: &str,
        data: &Row,
        criteria: &Row,
        types: &ColumnTypes,
    ) -> Result<Mutation> {
        let types = self.with_lob_types(table, data, types)?;
        self.inner.prepare_update(table, data, criteria, &types)
    }

    fn prepare_select(&self, request: &SelectRequest) -> Result<Query> {
        let (request, distinct) = rewrite::rewrite_grouping(request);
        let query = self.inner.prepare_select(&request)?;
        Ok(if distinct { query.mark_distinct() } else { query })
    }

    fn prepare_builder(&self, builder: &mut QueryBuilder) -> Result<Query> {
        let distinct = rewrite::is_uid_grouping(builder.query_part(QueryPart::GroupBy));
        if distinct {
            builder.reset_query_part(QueryPart::GroupBy);
        }

        let query = self.inner.prepare_builder(builder)?;
        Ok(if distinct { query.mark_distinct() } else { query })
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        rewrite::quote_identifier(identifier)
    }

    fn unquote_identifier(&self, identifier: &str) -> String {
        rewrite::unquote_identifier(identifier).to_string()
    }
}
