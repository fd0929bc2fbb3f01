use std::{cell::RefCell, collections::BTreeMap, error::Error as StdError, fmt};

use sqlshim_core::{
    Connection, ExecutionError, Mutation, ParameterType, Query, Result, Row, Value, quote_literal,
};

#[derive(Debug, Default)]
struct FailureRule {
    sql: String,
    message: String,
}

#[derive(Debug, Default)]
pub struct FakeConnection {
    state: RefCell<FakeConnectionState>,
}

#[derive(Debug, Default)]
struct FakeConnectionState {
    executed_sql: Vec<String>,
    bound_types: Vec<Vec<ParameterType>>,
    rows_by_sql: BTreeMap<String, Vec<Row>>,
    last_insert_id: String,
    fail_on_sql: Option<FailureRule>,
}

#[allow(dead_code)]
impl FakeConnection {
    pub fn set_rows(&self, sql: impl Into<String>, rows: Vec<Row>) {
        self.state.borrow_mut().rows_by_sql.insert(sql.into(), rows);
    }

    pub fn set_last_insert_id(&self, id: impl Into<String>) {
        self.state.borrow_mut().last_insert_id = id.into();
    }

    pub fn set_fail_on_sql(&self, sql: impl Into<String>, message: impl Into<String>) {
        self.state.borrow_mut().fail_on_sql = Some(FailureRule {
            sql: sql.into(),
            message: message.into(),
        });
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.state.borrow().executed_sql.clone()
    }

    pub fn bound_types(&self) -> Vec<Vec<ParameterType>> {
        self.state.borrow().bound_types.clone()
    }

    fn record(&self, sql: &str, types: &[ParameterType]) -> Result<()> {
        let mut state = self.state.borrow_mut();

        if let Some(rule) = &state.fail_on_sql
            && rule.sql == sql
        {
            return Err(ExecutionError::statement_failed(
                sql,
                FakeSourceError(rule.message.clone()),
            )
            .into());
        }

        state.executed_sql.push(sql.to_string());
        state.bound_types.push(types.to_vec());
        Ok(())
    }
}

impl Connection for FakeConnection {
    fn execute_update(&self, mutation: Mutation) -> Result<u64> {
        self.record(mutation.sql(), mutation.types())?;
        Ok(1)
    }

    fn execute_query(&self, query: Query) -> Result<Vec<Row>> {
        self.record(query.sql(), query.types())?;
        Ok(self
            .state
            .borrow()
            .rows_by_sql
            .get(query.sql())
            .cloned()
            .unwrap_or_default())
    }

    fn quote(&self, value: &Value, _parameter_type: ParameterType) -> Result<Value> {
        Ok(quote_literal(value))
    }

    fn last_insert_id(&self, _name: Option<&str>) -> Result<String> {
        Ok(self.state.borrow().last_insert_id.clone())
    }
}

#[derive(Debug)]
struct FakeSourceError(String);

impl fmt::Display for FakeSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for FakeSourceError {}
