use std::sync::Arc;

use sqlshim_core::{ColumnTypes, Connection, Error, ParameterType, Row, Value};
use sqlshim_dialect_mssql::{CatalogMetadata, ColumnCatalog, MssqlConnection, StaticMetadata};
use sqlshim_testkit::{RecordingConnection, StatementKind, row};

const LOB_CATALOG_FRAGMENT: &str = "INFORMATION_SCHEMA.COLUMNS";

fn scripted_base() -> RecordingConnection {
    let base = RecordingConnection::new();
    base.script_rows(
        LOB_CATALOG_FRAGMENT,
        vec![
            row([("table_name", "Files"), ("column_name", "Content")]),
            row([("table_name", "Files"), ("column_name", "Thumbnail")]),
        ],
    );
    base
}

fn bound_update_types(base: &RecordingConnection) -> Vec<Vec<ParameterType>> {
    base.executed()
        .into_iter()
        .filter(|statement| statement.kind == StatementKind::Update)
        .map(|statement| statement.types)
        .collect()
}

fn file_row() -> Row {
    row([
        ("content", Value::from("raw")),
        ("name", Value::from("a.bin")),
    ])
}

#[test]
fn lob_columns_are_upgraded_on_insert_and_update() {
    let base = scripted_base();
    let connection = MssqlConnection::new(base.clone());

    connection
        .insert("files", &file_row(), &ColumnTypes::new())
        .expect("insert");
    connection
        .update(
            "[dbo].[files]",
            &row([("Content", Value::from("next"))]),
            &row([("id", Value::Int(3))]),
            &ColumnTypes::new(),
        )
        .expect("update");

    assert_eq!(
        bound_update_types(&base),
        vec![
            vec![ParameterType::LargeObject, ParameterType::String],
            vec![ParameterType::LargeObject, ParameterType::Integer],
        ]
    );
}

#[test]
fn tables_missing_from_the_cache_keep_caller_types() {
    let base = scripted_base();
    let connection = MssqlConnection::new(base.clone());
    let mut types = ColumnTypes::new();
    types.insert("name".to_string(), ParameterType::Binary);

    connection
        .insert("notes", &file_row(), &types)
        .expect("insert");

    assert_eq!(
        bound_update_types(&base),
        vec![vec![ParameterType::String, ParameterType::Binary]]
    );
}

#[test]
fn lob_catalog_is_loaded_once_per_catalog() {
    let base = scripted_base();
    let connection = MssqlConnection::new(base.clone());

    for table in ["files", "notes", "files"] {
        connection
            .insert(table, &file_row(), &ColumnTypes::new())
            .expect("insert");
    }

    assert_eq!(base.count_containing(LOB_CATALOG_FRAGMENT), 1);
}

#[test]
fn shared_catalog_is_loaded_by_the_first_connection_only() {
    let catalog: Arc<dyn ColumnCatalog> = Arc::new(CatalogMetadata::default());
    let first_base = scripted_base();
    let second_base = scripted_base();
    let first = MssqlConnection::with_catalog(first_base.clone(), Arc::clone(&catalog));
    let second = MssqlConnection::with_catalog(second_base.clone(), catalog);

    first
        .insert("files", &file_row(), &ColumnTypes::new())
        .expect("first insert");
    second
        .insert("files", &file_row(), &ColumnTypes::new())
        .expect("second insert");

    assert_eq!(first_base.count_containing(LOB_CATALOG_FRAGMENT), 1);
    assert_eq!(second_base.count_containing(LOB_CATALOG_FRAGMENT), 0);
    assert_eq!(
        bound_update_types(&second_base),
        vec![vec![ParameterType::LargeObject, ParameterType::String]]
    );
}

#[test]
fn catalog_queries_use_the_configured_schema() {
    let base = scripted_base();
    let connection =
        MssqlConnection::with_catalog(base.clone(), Arc::new(CatalogMetadata::new("sales")));

    connection
        .insert("files", &file_row(), &ColumnTypes::new())
        .expect("insert");

    assert_eq!(base.count_containing("TABLE_SCHEMA = N'sales'"), 1);
    assert_eq!(base.count_containing("OBJECT_ID(N'[sales].[files]')"), 1);
}

#[test]
fn catalog_failures_propagate_the_base_error_unchanged() {
    let base = RecordingConnection::new();
    base.fail_on(LOB_CATALOG_FRAGMENT);
    let connection = MssqlConnection::new(base.clone());

    let error = connection
        .insert("files", &file_row(), &ColumnTypes::new())
        .expect_err("catalog failure");

    assert!(
        matches!(
            &error,
            Error::Execute(execution) if execution.sql().contains(LOB_CATALOG_FRAGMENT)
        ),
        "unexpected error: {error:?}"
    );
    assert!(bound_update_types(&base).is_empty(), "insert must not run");
}

#[test]
fn identity_lookup_failures_propagate_the_base_error_unchanged() {
    let base = RecordingConnection::new();
    base.fail_on("sys.identity_columns");
    let connection = MssqlConnection::new(base.clone());

    let error = connection
        .insert("files", &file_row(), &ColumnTypes::new())
        .expect_err("identity lookup failure");

    assert!(
        matches!(
            &error,
            Error::Execute(execution) if execution.sql().contains("sys.identity_columns")
        ),
        "unexpected error: {error:?}"
    );
}

#[test]
fn static_metadata_never_queries_the_server() {
    let base = RecordingConnection::new();
    let catalog = StaticMetadata::new()
        .with_lob_column("files", "content")
        .with_identity_column("files", "id");
    let connection = MssqlConnection::with_catalog(base.clone(), Arc::new(catalog));

    connection
        .insert("files", &file_row(), &ColumnTypes::new())
        .expect("insert");

    let executed = base.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].kind, StatementKind::Update);
    assert_eq!(
        executed[0].types,
        vec![ParameterType::LargeObject, ParameterType::String]
    );
}
