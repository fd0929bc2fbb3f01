use crate::{
    BuildError, ColumnTypes, Mutation, ParameterType, Query, QueryBuilder, Result, Row,
    SelectRequest, Value,
};

/// Synchronous relational connection.
///
/// Implementors provide statement execution, quoting and identity lookup.
/// The provided methods build generic SQL and route it through
/// `execute_update` / `execute_query`; a dialect connection overrides the
/// `prepare_*` steps and the two execute methods to reshape statements.
pub trait Connection {
    fn execute_update(&self, mutation: Mutation) -> Result<u64>;
    fn execute_query(&self, query: Query) -> Result<Vec<Row>>;

    /// Quotes a value as an SQL literal. Drivers may hand numbers back as
    /// non-textual values.
    fn quote(&self, value: &Value, parameter_type: ParameterType) -> Result<Value>;

    fn last_insert_id(&self, name: Option<&str>) -> Result<String>;

    fn prepare_insert(&self, table: &str, data: &Row, types: &ColumnTypes) -> Result<Mutation> {
        Ok(build_insert(table, data, types))
    }

    fn prepare_update(
        &self,
        table: &str,
        data: &Row,
        criteria: &Row,
        types: &ColumnTypes,
    ) -> Result<Mutation> {
        Ok(build_update(table, data, criteria, types)?)
    }

    fn prepare_select(&self, request: &SelectRequest) -> Result<Query> {
        Ok(request.to_builder().to_query()?)
    }

    /// Serializes a builder. Dialects may edit the builder's parts first.
    fn prepare_builder(&self, builder: &mut QueryBuilder) -> Result<Query> {
        Ok(builder.to_query()?)
    }

    fn insert(&self, table: &str, data: &Row, types: &ColumnTypes) -> Result<u64> {
        let mutation = self.prepare_insert(table, data, types)?;
        self.execute_update(mutation)
    }

    fn update(&self, table: &str, data: &Row, criteria: &Row, types: &ColumnTypes) -> Result<u64> {
        let mutation = self.prepare_update(table, data, criteria, types)?;
        self.execute_update(mutation)
    }

    fn select(&self, request: &SelectRequest) -> Result<Vec<Row>> {
        let query = self.prepare_select(request)?;
        self.execute_query(query)
    }

    fn execute_builder(&self, builder: &mut QueryBuilder) -> Result<Vec<Row>> {
        let query = self.prepare_builder(builder)?;
        self.execute_query(query)
    }

    fn fetch_all(&self, sql: &str) -> Result<Vec<Row>> {
        self.execute_query(Query::raw(sql))
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn unquote_identifier(&self, identifier: &str) -> String {
        identifier.trim_matches('"').to_string()
    }
}

impl<C> Connection for Box<C>
where
    C: Connection + ?Sized,
{
    fn execute_update(&self, mutation: Mutation) -> Result<u64> {
        (**self).execute_update(mutation)
    }

    fn execute_query(&self, query: Query) -> Result<Vec<Row>> {
        (**self).execute_query(query)
    }

    fn quote(&self, value: &Value, parameter_type: ParameterType) -> Result<Value> {
        (**self).quote(value, parameter_type)
    }

    fn last_insert_id(&self, name: Option<&str>) -> Result<String> {
        (**self).last_insert_id(name)
    }

    fn prepare_insert(&self, table: &str, data: &Row, types: &ColumnTypes) -> Result<Mutation> {
        (**self).prepare_insert(table, data, types)
    }

    fn prepare_update(
        &self,
        table: &str,
        data: &Row,
        criteria: &Row,
        types: &ColumnTypes,
    ) -> Result<Mutation> {
        (**self).prepare_update(table, data, criteria, types)
    }

    fn prepare_select(&self, request: &SelectRequest) -> Result<Query> {
        (**self).prepare_select(request)
    }

    fn prepare_builder(&self, builder: &mut QueryBuilder) -> Result<Query> {
        (**self).prepare_builder(builder)
    }

    fn insert(&self, table: &str, data: &Row, types: &ColumnTypes) -> Result<u64> {
        (**self).insert(table, data, types)
    }

    fn update(&self, table: &str, data: &Row, criteria: &Row, types: &ColumnTypes) -> Result<u64> {
        (**self).update(table, data, criteria, types)
    }

    fn select(&self, request: &SelectRequest) -> Result<Vec<Row>> {
        (**self).select(request)
    }

    fn execute_builder(&self, builder: &mut QueryBuilder) -> Result<Vec<Row>> {
        (**self).execute_builder(builder)
    }

    fn fetch_all(&self, sql: &str) -> Result<Vec<Row>> {
        (**self).fetch_all(sql)
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        (**self).quote_identifier(identifier)
    }

    fn unquote_identifier(&self, identifier: &str) -> String {
        (**self).unquote_identifier(identifier)
    }
}

/// `INSERT INTO <table> (<columns>) VALUES (?, ...)`; columns in key order.
#[must_use]
pub fn build_insert(table: &str, data: &Row, types: &ColumnTypes) -> Mutation {
    if data.is_empty() {
        return Mutation::new(format!("INSERT INTO {table} DEFAULT VALUES"));
    }

    let columns = data.keys().map(String::as_str).collect::<Vec<_>>();
    let placeholders = vec!["?"; columns.len()];
    let (params, bound_types) = bind_values(data, types);

    Mutation::new(format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    ))
    .with_params(params, bound_types)
}

/// `UPDATE <table> SET c = ?, ... [WHERE k = ? AND ...]`.
pub fn build_update(
    table: &str,
    data: &Row,
    criteria: &Row,
    types: &ColumnTypes,
) -> std::result::Result<Mutation, BuildError> {
    if data.is_empty() {
        return Err(BuildError::EmptyUpdate {
            table: table.to_string(),
        });
    }

    let assignments = data
        .keys()
        .map(|column| format!("{column} = ?"))
        .collect::<Vec<_>>();
    let (mut params, mut bound_types) = bind_values(data, types);

    let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
    let mut conditions = Vec::with_capacity(criteria.len());
    for (column, value) in criteria {
        if value.is_null() {
            conditions.push(format!("{column} IS NULL"));
            continue;
        }
        conditions.push(format!("{column} = ?"));
        params.push(value.clone());
        bound_types.push(resolve_type(column, value, types));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    Ok(Mutation::new(sql).with_params(params, bound_types))
}

/// Generic literal quoting: numbers stay numeric, text becomes a
/// single-quoted literal, bytes a hex literal.
#[must_use]
pub fn quote_literal(value: &Value) -> Value {
    match value {
        Value::Null => Value::Text("NULL".to_string()),
        Value::Bool(value) => Value::Int(i64::from(*value)),
        Value::Int(value) => Value::Int(*value),
        Value::Float(value) => Value::Float(*value),
        Value::Text(value) => Value::Text(format!("'{}'", value.replace('\'', "''"))),
        Value::Bytes(bytes) => Value::Text(format!("X'{}'", hex_upper(bytes))),
    }
}

pub(crate) fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02X}")).collect()
}

fn bind_values(data: &Row, types: &ColumnTypes) -> (Vec<Value>, Vec<ParameterType>) {
    data.iter()
        .map(|(column, value)| (value.clone(), resolve_type(column, value, types)))
        .unzip()
}

fn resolve_type(column: &str, value: &Value, types: &ColumnTypes) -> ParameterType {
    types
        .get(column)
        .copied()
        .unwrap_or_else(|| ParameterType::infer(value))
}

#[cfg(test)]
mod tests {
    use super::{build_insert, build_update, quote_literal};
    use crate::{BuildError, ColumnTypes, ParameterType, Row, Value};

    fn row(entries: &[(&str, Value)]) -> Row {
        entries
            .iter()
            .map(|(column, value)| ((*column).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn build_insert_orders_columns_and_resolves_types() {
        let data = row(&[("name", Value::from("a")), ("id", Value::Int(3))]);
        let mut types = ColumnTypes::new();
        types.insert("name".to_string(), ParameterType::LargeObject);

        let mutation = build_insert("files", &data, &types);

        assert_eq!(mutation.sql(), "INSERT INTO files (id, name) VALUES (?, ?)");
        assert_eq!(
            mutation.types(),
            &[ParameterType::Integer, ParameterType::LargeObject]
        );
    }

    #[test]
    fn build_insert_without_data_uses_default_values() {
        let mutation = build_insert("files", &Row::new(), &ColumnTypes::new());
        assert_eq!(mutation.sql(), "INSERT INTO files DEFAULT VALUES");
        assert!(mutation.params().is_empty());
    }

    #[test]
    fn build_update_binds_assignments_before_criteria() {
        let data = row(&[("title", Value::from("x"))]);
        let criteria = row(&[("id", Value::Int(9)), ("parent", Value::Null)]);

        let mutation =
            build_update("notes", &data, &criteria, &ColumnTypes::new()).expect("update builds");

        assert_eq!(
            mutation.sql(),
            "UPDATE notes SET title = ? WHERE id = ? AND parent IS NULL"
        );
        assert_eq!(mutation.params(), &[Value::from("x"), Value::Int(9)]);
    }

    #[test]
    fn build_update_rejects_empty_assignment_list() {
        let error = build_update("notes", &Row::new(), &Row::new(), &ColumnTypes::new())
            .expect_err("empty update must fail");
        assert_eq!(
            error,
            BuildError::EmptyUpdate {
                table: "notes".to_string()
            }
        );
    }

    #[test]
    fn quote_literal_keeps_numbers_numeric() {
        assert_eq!(quote_literal(&Value::Int(42)), Value::Int(42));
        assert_eq!(
            quote_literal(&Value::from("it's")),
            Value::Text("'it''s'".to_string())
        );
        assert_eq!(
            quote_literal(&Value::Bytes(vec![0xab, 0x01])),
            Value::Text("X'AB01'".to_string())
        );
    }
}
