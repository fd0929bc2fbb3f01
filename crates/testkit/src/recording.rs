use std::{cell::RefCell, io, rc::Rc};

use sqlshim_core::{
    Connection, ExecutionError, Mutation, ParameterType, Query, Result, Row, Value, quote_literal,
};

const DEFAULT_AFFECTED_ROWS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Update,
    Query,
}

/// A statement as it reached the base connection.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
    pub types: Vec<ParameterType>,
}

#[derive(Debug, Default)]
struct RecordingState {
    executed: Vec<RecordedStatement>,
    scripted_rows: Vec<(String, Vec<Row>)>,
    failing_fragments: Vec<String>,
    last_insert_id: String,
}

/// Base connection that records every statement instead of running it.
///
/// Clones share state, so a test can hand one clone to a dialect and keep
/// another to inspect what was executed. Queries answer with the rows of
/// the first scripted fragment contained in the SQL, or no rows.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnection {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers queries whose SQL contains `fragment` with `rows`.
    pub fn script_rows(&self, fragment: impl Into<String>, rows: Vec<Row>) {
        self.state
            .borrow_mut()
            .scripted_rows
            .push((fragment.into(), rows));
    }

    /// Fails every statement whose SQL contains `fragment`.
    pub fn fail_on(&self, fragment: impl Into<String>) {
        self.state
            .borrow_mut()
            .failing_fragments
            .push(fragment.into());
    }

    pub fn set_last_insert_id(&self, id: impl Into<String>) {
        self.state.borrow_mut().last_insert_id = id.into();
    }

    #[must_use]
    pub fn executed(&self) -> Vec<RecordedStatement> {
        self.state.borrow().executed.clone()
    }

    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        self.state
            .borrow()
            .executed
            .iter()
            .map(|statement| statement.sql.clone())
            .collect()
    }

    /// Executed statements whose SQL contains `fragment`.
    #[must_use]
    pub fn count_containing(&self, fragment: &str) -> usize {
        self.state
            .borrow()
            .executed
            .iter()
            .filter(|statement| statement.sql.contains(fragment))
            .count()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().executed.clear();
    }

    fn record(
        &self,
        kind: StatementKind,
        sql: &str,
        params: &[Value],
        types: &[ParameterType],
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.executed.push(RecordedStatement {
            kind,
            sql: sql.to_string(),
            params: params.to_vec(),
            types: types.to_vec(),
        });

        if state
            .failing_fragments
            .iter()
            .any(|fragment| sql.contains(fragment.as_str()))
        {
            return Err(ExecutionError::statement_failed(
                sql,
                io::Error::other("scripted failure"),
            )
            .into());
        }

        Ok(())
    }
}

impl Connection for RecordingConnection {
    fn execute_update(&self, mutation: Mutation) -> Result<u64> {
        self.record(
            StatementKind::Update,
            mutation.sql(),
            mutation.params(),
            mutation.types(),
        )?;
        Ok(DEFAULT_AFFECTED_ROWS)
    }

    fn execute_query(&self, query: Query) -> Result<Vec<Row>> {
        self.record(
            StatementKind::Query,
            query.sql(),
            query.params(),
            query.types(),
        )?;

        let state = self.state.borrow();
        Ok(state
            .scripted_rows
            .iter()
            .find(|(fragment, _)| query.sql().contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn quote(&self, value: &Value, _parameter_type: ParameterType) -> Result<Value> {
        Ok(quote_literal(value))
    }

    fn last_insert_id(&self, _name: Option<&str>) -> Result<String> {
        Ok(self.state.borrow().last_insert_id.clone())
    }
}
