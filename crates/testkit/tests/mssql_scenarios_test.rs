use sqlshim_dialect_mssql::MssqlDialect;
use sqlshim_testkit::{TestResult, load_test_cases_from_str, run_test};

const MSSQL_SCENARIOS: &str = include_str!("testdata/mssql_scenarios.yml");

#[test]
fn mssql_scenarios_pass() {
    let cases = load_test_cases_from_str(MSSQL_SCENARIOS).expect("scenario file must parse");
    assert!(!cases.is_empty(), "scenario file must define testcases");

    let failures = cases
        .iter()
        .filter_map(|(name, case)| match run_test(&MssqlDialect::new(), case) {
            TestResult::Passed => None,
            TestResult::Failed(reason) => Some(format!("{name}: {reason}")),
        })
        .collect::<Vec<_>>();

    assert!(failures.is_empty(), "failed scenarios:\n{}", failures.join("\n"));
}

#[test]
fn mssql_scenario_with_wrong_expectation_fails() {
    let yaml = r#"
wrong_expectation:
  steps:
    - op: builder
      from: "[events]"
      group_by: ["[events].[uid]"]
  executed:
    - SELECT * FROM [events] GROUP BY [events].[uid]
"#;
    let cases = load_test_cases_from_str(yaml).expect("yaml must parse");
    let case = cases.get("wrong_expectation").expect("testcase must exist");

    let TestResult::Failed(reason) = run_test(&MssqlDialect::new(), case) else {
        panic!("rewritten SQL must not match the original grouping");
    };
    assert!(reason.contains("SELECT DISTINCT * FROM [events]"), "{reason}");
}
