mod recording;
mod yaml_runner;

pub use recording::{RecordedStatement, RecordingConnection, StatementKind};
pub use yaml_runner::{
    ExpectedStatement, RunnerError, ScriptedRows, Step, TestCase, TestResult,
    load_test_cases_from_str, run_test,
};

use sqlshim_core::{Row, Value};

/// Builds a row from `(column, value)` pairs.
pub fn row<I, K, V>(entries: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    entries
        .into_iter()
        .map(|(column, value)| (column.into(), value.into()))
        .collect()
}
