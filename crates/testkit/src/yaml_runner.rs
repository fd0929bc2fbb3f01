use std::collections::BTreeMap;

use serde::Deserialize;
use sqlshim_core::{
    ColumnTypes, Connection, ConnectionConfig, Dialect, ParameterType, QueryBuilder, Row,
    SelectRequest, SortOrder, Value,
};
use thiserror::Error;

use crate::RecordingConnection;

const TESTCASE_DATABASE: &str = "sqlshim_test";

/// One scenario: a dialect-adapted recording connection, a list of calls
/// made through it, and what the base connection must have seen.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestCase {
    /// Dialect configuration keys, e.g. `mssql.identity_columns`.
    pub extra: BTreeMap<String, String>,
    /// Rows returned for queries containing the given SQL fragment.
    pub rows: Vec<ScriptedRows>,
    pub steps: Vec<Step>,
    pub executed: Option<Vec<ExpectedStatement>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedRows {
    pub when: String,
    pub rows: Vec<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Insert {
        table: String,
        data: BTreeMap<String, serde_yaml::Value>,
        #[serde(default)]
        types: BTreeMap<String, String>,
    },
    Update {
        table: String,
        data: BTreeMap<String, serde_yaml::Value>,
        #[serde(default)]
        criteria: BTreeMap<String, serde_yaml::Value>,
        #[serde(default)]
        types: BTreeMap<String, String>,
    },
    Select {
        table: String,
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default)]
        group_by: Vec<String>,
        #[serde(default)]
        order_by: Vec<String>,
    },
    Builder {
        from: String,
        #[serde(default)]
        select: Vec<String>,
        #[serde(default)]
        group_by: Vec<String>,
        #[serde(default)]
        order_by: Vec<String>,
    },
    Quote {
        value: serde_yaml::Value,
        expect: String,
    },
    LastInsertId {
        #[serde(default)]
        name: Option<String>,
        expect: String,
    },
}

/// Expected base-connection statement: bare SQL, or SQL plus bound types.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpectedStatement {
    Sql(String),
    Typed { sql: String, types: Vec<String> },
}

impl ExpectedStatement {
    fn sql(&self) -> &str {
        match self {
            Self::Sql(sql) | Self::Typed { sql, .. } => sql,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid yaml testcase: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Connection(#[from] sqlshim_core::Error),
    #[error("{0}")]
    Assertion(String),
}

pub fn load_test_cases_from_str(
    yaml: &str,
) -> std::result::Result<BTreeMap<String, TestCase>, RunnerError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn run_test(dialect: &dyn Dialect, test: &TestCase) -> TestResult {
    match evaluate_expected_error(test, run_test_flow(dialect, test)) {
        Ok(()) => TestResult::Passed,
        Err(error) => TestResult::Failed(error.to_string()),
    }
}

fn run_test_flow(dialect: &dyn Dialect, test: &TestCase) -> Result<(), RunnerError> {
    let base = RecordingConnection::new();
    for scripted in &test.rows {
        let rows = scripted
            .rows
            .iter()
            .map(convert_row)
            .collect::<Result<Vec<_>, _>>()?;
        base.script_rows(scripted.when.clone(), rows);
    }

    let config = ConnectionConfig {
        database: TESTCASE_DATABASE.to_string(),
        extra: test.extra.clone(),
        ..ConnectionConfig::default()
    };
    let connection = dialect.adapt(Box::new(base.clone()), &config)?;

    for step in &test.steps {
        run_step(connection.as_ref(), step)?;
    }

    assert_executed(test.executed.as_deref(), &base)
}

fn run_step(connection: &dyn Connection, step: &Step) -> Result<(), RunnerError> {
    match step {
        Step::Insert { table, data, types } => {
            connection.insert(table, &convert_row(data)?, &convert_types(types)?)?;
        }
        Step::Update {
            table,
            data,
            criteria,
            types,
        } => {
            connection.update(
                table,
                &convert_row(data)?,
                &convert_row(criteria)?,
                &convert_types(types)?,
            )?;
        }
        Step::Select {
            table,
            columns,
            group_by,
            order_by,
        } => {
            let mut request = SelectRequest::new(table.as_str())
                .columns(columns.iter().map(String::as_str))
                .group_by(group_by.iter().map(String::as_str));
            for entry in order_by {
                let (column, order) = parse_sort(entry)?;
                request = request.order_by(column, order);
            }
            connection.select(&request)?;
        }
        Step::Builder {
            from,
            select,
            group_by,
            order_by,
        } => {
            let mut builder = QueryBuilder::new();
            builder
                .select(select.iter().map(String::as_str))
                .from(from.as_str())
                .group_by(group_by.iter().map(String::as_str));
            for entry in order_by {
                let (column, order) = parse_sort(entry)?;
                builder.add_order_by(column, order);
            }
            connection.execute_builder(&mut builder)?;
        }
        Step::Quote { value, expect } => {
            let value = convert_value(value)?;
            let quoted = connection.quote(&value, ParameterType::infer(&value))?;
            if quoted != Value::Text(expect.clone()) {
                return Err(RunnerError::Assertion(format!(
                    "quote mismatch; expected text {expect:?}, got {quoted:?}"
                )));
            }
        }
        Step::LastInsertId { name, expect } => {
            let id = connection.last_insert_id(name.as_deref())?;
            if &id != expect {
                return Err(RunnerError::Assertion(format!(
                    "last_insert_id mismatch; expected {expect:?}, got {id:?}"
                )));
            }
        }
    }

    Ok(())
}

fn assert_executed(
    expected: Option<&[ExpectedStatement]>,
    base: &RecordingConnection,
) -> Result<(), RunnerError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let actual = base.executed();
    let expected_sql = expected.iter().map(ExpectedStatement::sql).collect::<Vec<_>>();
    let actual_sql = actual
        .iter()
        .map(|statement| statement.sql.trim())
        .collect::<Vec<_>>();
    if expected_sql.iter().map(|sql| sql.trim()).ne(actual_sql.iter().copied()) {
        return Err(RunnerError::Assertion(format!(
            "executed SQL mismatch; expected:\n{}\nactual:\n{}",
            expected_sql.join("\n"),
            actual_sql.join("\n")
        )));
    }

    for (statement, recorded) in expected.iter().zip(&actual) {
        let ExpectedStatement::Typed { sql, types } = statement else {
            continue;
        };
        let actual_types = recorded
            .types
            .iter()
            .map(|parameter_type| parameter_type_name(*parameter_type))
            .collect::<Vec<_>>();
        if types.iter().map(String::as_str).ne(actual_types.iter().copied()) {
            return Err(RunnerError::Assertion(format!(
                "bound types mismatch for `{sql}`; expected {types:?}, got {actual_types:?}"
            )));
        }
    }

    Ok(())
}

fn evaluate_expected_error(
    test: &TestCase,
    execution_result: Result<(), RunnerError>,
) -> Result<(), RunnerError> {
    let Some(expected_error) = test.error.as_deref() else {
        return execution_result;
    };

    match execution_result {
        Ok(()) => Err(RunnerError::Assertion(format!(
            "expected error: {expected_error}, but got no error"
        ))),
        Err(RunnerError::Connection(actual_error)) => {
            let actual_error = actual_error.to_string();
            if actual_error == expected_error {
                Ok(())
            } else {
                Err(RunnerError::Assertion(format!(
                    "expected error: {expected_error}, but got: {actual_error}"
                )))
            }
        }
        Err(other) => Err(other),
    }
}

fn parse_sort(entry: &str) -> Result<(&str, SortOrder), RunnerError> {
    let entry = entry.trim();
    let Some((column, keyword)) = entry.rsplit_once(char::is_whitespace) else {
        return Ok((entry, SortOrder::Asc));
    };

    match keyword.to_ascii_uppercase().as_str() {
        "ASC" => Ok((column.trim_end(), SortOrder::Asc)),
        "DESC" => Ok((column.trim_end(), SortOrder::Desc)),
        _ => Err(RunnerError::Assertion(format!(
            "invalid sort entry `{entry}`; expected `<column> [ASC|DESC]`"
        ))),
    }
}

fn convert_row(raw: &BTreeMap<String, serde_yaml::Value>) -> Result<Row, RunnerError> {
    raw.iter()
        .map(|(column, value)| Ok((column.clone(), convert_value(value)?)))
        .collect()
}

fn convert_value(raw: &serde_yaml::Value) -> Result<Value, RunnerError> {
    match raw {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(value) => Ok(Value::Bool(*value)),
        serde_yaml::Value::Number(number) => number
            .as_i64()
            .map(Value::Int)
            .or_else(|| number.as_f64().map(Value::Float))
            .ok_or_else(|| RunnerError::Assertion(format!("unsupported number `{number}`"))),
        serde_yaml::Value::String(text) => Ok(Value::Text(text.clone())),
        other => Err(RunnerError::Assertion(format!(
            "unsupported testcase value `{other:?}`"
        ))),
    }
}

fn convert_types(raw: &BTreeMap<String, String>) -> Result<ColumnTypes, RunnerError> {
    raw.iter()
        .map(|(column, name)| Ok((column.clone(), parse_parameter_type(name)?)))
        .collect()
}

fn parse_parameter_type(name: &str) -> Result<ParameterType, RunnerError> {
    match name.trim() {
        "null" => Ok(ParameterType::Null),
        "integer" => Ok(ParameterType::Integer),
        "string" => Ok(ParameterType::String),
        "large_object" => Ok(ParameterType::LargeObject),
        "boolean" => Ok(ParameterType::Boolean),
        "binary" => Ok(ParameterType::Binary),
        other => Err(RunnerError::Assertion(format!(
            "unknown parameter type `{other}`"
        ))),
    }
}

const fn parameter_type_name(parameter_type: ParameterType) -> &'static str {
    match parameter_type {
        ParameterType::Null => "null",
        ParameterType::Integer => "integer",
        ParameterType::String => "string",
        ParameterType::LargeObject => "large_object",
        ParameterType::Boolean => "boolean",
        ParameterType::Binary => "binary",
    }
}
