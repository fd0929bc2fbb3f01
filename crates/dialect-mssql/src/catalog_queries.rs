// Catalog lookups issued through the wrapped connection. Projections are
// aliased so rows can be read by column name.

pub(crate) const LOB_COLUMNS_QUERY_TEMPLATE: &str = r#"
SELECT
    c.TABLE_NAME AS table_name,
    c.COLUMN_NAME AS column_name
FROM INFORMATION_SCHEMA.COLUMNS AS c
WHERE c.TABLE_SCHEMA = N'{schema_literal}'
  AND c.DATA_TYPE IN ('varbinary', 'binary', 'image')
ORDER BY c.TABLE_NAME ASC, c.ORDINAL_POSITION ASC;
"#;

pub(crate) const IDENTITY_COLUMN_QUERY_TEMPLATE: &str = r#"
SELECT
    ic.name AS column_name
FROM sys.identity_columns AS ic
WHERE ic.object_id = OBJECT_ID(N'{object_id_literal}');
"#;

pub(crate) const IDENT_CURRENT_QUERY_TEMPLATE: &str = "SELECT IDENT_CURRENT('{table_literal}') AS id";
pub(crate) const SESSION_IDENTITY_QUERY: &str = "SELECT @@IDENTITY AS id";

pub(crate) const TABLE_NAME_COLUMN: &str = "table_name";
pub(crate) const COLUMN_NAME_COLUMN: &str = "column_name";
pub(crate) const IDENTITY_VALUE_COLUMN: &str = "id";

pub(crate) fn lob_columns_query(schema: &str) -> String {
    LOB_COLUMNS_QUERY_TEMPLATE.replace("{schema_literal}", &escape_literal(schema))
}

pub(crate) fn identity_column_query(object_name: &str) -> String {
    IDENTITY_COLUMN_QUERY_TEMPLATE.replace("{object_id_literal}", &escape_literal(object_name))
}

pub(crate) fn ident_current_query(table: &str) -> String {
    IDENT_CURRENT_QUERY_TEMPLATE.replace("{table_literal}", &escape_literal(table))
}

fn escape_literal(raw: &str) -> String {
    raw.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::{ident_current_query, identity_column_query, lob_columns_query};

    #[test]
    fn ident_current_query_embeds_table_name_verbatim() {
        assert_eq!(
            ident_current_query("orders"),
            "SELECT IDENT_CURRENT('orders') AS id"
        );
        assert_eq!(
            ident_current_query("o'rders"),
            "SELECT IDENT_CURRENT('o''rders') AS id"
        );
    }

    #[test]
    fn catalog_queries_escape_literals() {
        assert!(lob_columns_query("sales").contains("c.TABLE_SCHEMA = N'sales'"));
        assert!(
            identity_column_query("[dbo].[it's]").contains("OBJECT_ID(N'[dbo].[it''s]')")
        );
    }
}
