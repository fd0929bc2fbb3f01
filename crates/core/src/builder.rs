use std::{collections::BTreeMap, fmt};

use crate::{BuildError, ParameterType, Query, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryPart {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
}

impl QueryPart {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::From => "from",
            Self::Where => "where",
            Self::GroupBy => "groupBy",
            Self::Having => "having",
            Self::OrderBy => "orderBy",
        }
    }
}

impl fmt::Display for QueryPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A SELECT statement kept as separate parts until it is serialized.
///
/// Parts hold SQL fragments verbatim; the builder never quotes identifiers.
/// Placeholders are positional `?` and bound in `set_parameter` order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QueryBuilder {
    parts: BTreeMap<QueryPart, Vec<String>>,
    params: Vec<Value>,
    types: Vec<ParameterType>,
}

impl QueryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_part(QueryPart::Select, columns)
    }

    pub fn add_select(&mut self, column: impl Into<String>) -> &mut Self {
        self.push_part(QueryPart::Select, column)
    }

    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        self.replace_part(QueryPart::From, [table])
    }

    pub fn and_where(&mut self, condition: impl Into<String>) -> &mut Self {
        self.push_part(QueryPart::Where, condition)
    }

    pub fn group_by<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_part(QueryPart::GroupBy, columns)
    }

    pub fn add_group_by(&mut self, column: impl Into<String>) -> &mut Self {
        self.push_part(QueryPart::GroupBy, column)
    }

    pub fn and_having(&mut self, condition: impl Into<String>) -> &mut Self {
        self.push_part(QueryPart::Having, condition)
    }

    pub fn add_order_by(&mut self, column: impl AsRef<str>, order: SortOrder) -> &mut Self {
        let column = column.as_ref();
        self.push_part(QueryPart::OrderBy, format!("{column} {}", order.keyword()))
    }

    pub fn set_parameter(&mut self, value: Value, parameter_type: ParameterType) -> &mut Self {
        self.params.push(value);
        self.types.push(parameter_type);
        self
    }

    /// Fragments currently held for `part`, in insertion order.
    #[must_use]
    pub fn query_part(&self, part: QueryPart) -> &[String] {
        self.parts.get(&part).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn reset_query_part(&mut self, part: QueryPart) -> &mut Self {
        self.parts.remove(&part);
        self
    }

    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    #[must_use]
    pub fn types(&self) -> &[ParameterType] {
        &self.types
    }

    pub fn to_sql(&self) -> Result<String, BuildError> {
        let from = self.query_part(QueryPart::From);
        if from.is_empty() {
            return Err(BuildError::MissingFrom);
        }

        let select = self.query_part(QueryPart::Select);
        let mut sql = String::from("SELECT ");
        if select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&select.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&from.join(", "));

        self.push_clause(&mut sql, " WHERE ", QueryPart::Where, " AND ");
        self.push_clause(&mut sql, " GROUP BY ", QueryPart::GroupBy, ", ");
        self.push_clause(&mut sql, " HAVING ", QueryPart::Having, " AND ");
        self.push_clause(&mut sql, " ORDER BY ", QueryPart::OrderBy, ", ");

        Ok(sql)
    }

    pub fn to_query(&self) -> Result<Query, BuildError> {
        Ok(Query::new(self.to_sql()?).with_params(self.params.clone(), self.types.clone()))
    }

    fn push_clause(&self, sql: &mut String, keyword: &str, part: QueryPart, separator: &str) {
        let fragments = self.query_part(part);
        if fragments.is_empty() {
            return;
        }

        sql.push_str(keyword);
        sql.push_str(&fragments.join(separator));
    }

    fn replace_part<I, S>(&mut self, part: QueryPart, fragments: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect::<Vec<_>>();
        if fragments.is_empty() {
            self.parts.remove(&part);
        } else {
            self.parts.insert(part, fragments);
        }
        self
    }

    fn push_part(&mut self, part: QueryPart, fragment: impl Into<String>) -> &mut Self {
        self.parts.entry(part).or_default().push(fragment.into());
        self
    }
}
