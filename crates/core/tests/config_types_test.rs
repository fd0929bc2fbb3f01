use std::collections::BTreeMap;

use sqlshim_core::ConnectionConfig;

#[test]
fn connection_config_exposes_connection_fields() {
    let mut extra = BTreeMap::new();
    extra.insert("mssql.schema".to_string(), "sales".to_string());

    let config = ConnectionConfig {
        host: Some("db.internal".to_string()),
        port: Some(1433),
        user: Some("sqlshim".to_string()),
        password: Some("secret".to_string()),
        database: "app".to_string(),
        extra,
    };

    assert_eq!(config.host.as_deref(), Some("db.internal"));
    assert_eq!(config.port, Some(1433));
    assert_eq!(config.user.as_deref(), Some("sqlshim"));
    assert_eq!(config.password.as_deref(), Some("secret"));
    assert_eq!(config.database, "app");
    assert_eq!(config.extra_value("mssql.schema"), Some("sales"));
}

#[test]
fn extra_value_treats_blank_entries_as_unset() {
    let mut config = ConnectionConfig::default();
    config
        .extra
        .insert("mssql.lob_columns".to_string(), "   ".to_string());

    assert_eq!(config.extra_value("mssql.lob_columns"), None);
    assert_eq!(config.extra_value("mssql.missing"), None);
}
