use once_cell::sync::Lazy;
use regex::Regex;
use sqlshim_core::SelectRequest;

static UID_GROUPING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[[^\]]+\]\.\[uid\]$").expect("uid grouping pattern must compile")
});

static LEADING_SELECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\s*)SELECT\s+(DISTINCT\b)?").expect("leading select pattern must compile")
});

/// Grouping columns in first-seen order, trimmed, without repeats.
pub(crate) fn dedupe_columns<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        let column = column.as_ref().trim();
        if !unique.iter().any(|seen| seen == column) {
            unique.push(column.to_string());
        }
    }
    unique
}

/// True when the grouping reduces to a single `[<table>].[uid]` column,
/// which is a request for distinct rows rather than aggregation.
pub(crate) fn is_uid_grouping<S: AsRef<str>>(columns: &[S]) -> bool {
    match dedupe_columns(columns).as_slice() {
        [single] => UID_GROUPING_PATTERN.is_match(single),
        _ => false,
    }
}

/// Applies T-SQL grouping rules to a select request. Returns the rewritten
/// request and whether the query must be made distinct at execution.
pub(crate) fn rewrite_grouping(request: &SelectRequest) -> (SelectRequest, bool) {
    let mut rewritten = request.clone();

    if is_uid_grouping(&request.group_by) {
        rewritten.group_by.clear();
        return (rewritten, true);
    }

    let mut group_by = dedupe_columns(&request.group_by);
    if !group_by.is_empty() {
        for (column, _) in &request.order_by {
            let column = column.trim();
            if !group_by.iter().any(|grouped| grouped == column) {
                group_by.push(column.to_string());
            }
        }
    }
    rewritten.group_by = group_by;

    (rewritten, false)
}

/// `SELECT ...` becomes `SELECT DISTINCT ...`. Statements that already
/// select distinct rows, or do not start with SELECT, are returned as is.
pub(crate) fn apply_distinct(sql: &str) -> Option<String> {
    let captures = LEADING_SELECT_PATTERN.captures(sql)?;
    if captures.get(2).is_some() {
        return None;
    }

    let matched = captures.get(0)?;
    let indent = captures.get(1).map_or("", |indent| indent.as_str());
    Some(format!(
        "{indent}SELECT DISTINCT {}",
        &sql[matched.end()..]
    ))
}

/// True when the statement already begins with `SELECT DISTINCT`.
pub(crate) fn is_select_distinct(sql: &str) -> bool {
    LEADING_SELECT_PATTERN
        .captures(sql)
        .is_some_and(|captures| captures.get(2).is_some())
}

pub(crate) fn unquote_identifier(identifier: &str) -> &str {
    identifier.trim_matches(|ch| ch == '[' || ch == ']')
}

/// Brackets each dot-separated part, escaping `]`.
pub(crate) fn quote_identifier(identifier: &str) -> String {
    identifier
        .split('.')
        .map(|part| format!("[{}]", unquote_identifier(part).replace(']', "]]")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Case-folded unqualified name used as the metadata lookup key.
pub(crate) fn object_key(identifier: &str) -> String {
    let name = identifier.rsplit('.').next().unwrap_or(identifier);
    unquote_identifier(name.trim()).to_lowercase()
}

pub(crate) fn identity_insert_prelude(table: &str) -> String {
    format!("SET IDENTITY_INSERT {} ON; ", quote_identifier(table))
}

pub(crate) fn identity_insert_postlude(table: &str) -> String {
    format!("; SET IDENTITY_INSERT {} OFF;", quote_identifier(table))
}
