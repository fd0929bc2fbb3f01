use crate::{ParameterType, Value};

/// A data-modifying statement ready for `Connection::execute_update`.
///
/// A prelude or postlude is SQL that must run in the same batch as the
/// statement. Dialect connections render them once, at execution time.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    sql: String,
    params: Vec<Value>,
    types: Vec<ParameterType>,
    prelude: Option<String>,
    postlude: Option<String>,
}

impl Mutation {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            types: Vec::new(),
            prelude: None,
            postlude: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<Value>, types: Vec<ParameterType>) -> Self {
        self.params = params;
        self.types = types;
        self
    }

    #[must_use]
    pub fn with_prelude(mut self, prelude: impl Into<String>) -> Self {
        self.prelude = Some(prelude.into());
        self
    }

    #[must_use]
    pub fn with_postlude(mut self, postlude: impl Into<String>) -> Self {
        self.postlude = Some(postlude.into());
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    #[must_use]
    pub fn types(&self) -> &[ParameterType] {
        &self.types
    }

    #[must_use]
    pub fn prelude(&self) -> Option<&str> {
        self.prelude.as_deref()
    }

    #[must_use]
    pub fn postlude(&self) -> Option<&str> {
        self.postlude.as_deref()
    }

    #[must_use]
    pub const fn has_pending_sql(&self) -> bool {
        self.prelude.is_some() || self.postlude.is_some()
    }

    /// Folds prelude and postlude into the statement text and clears them.
    #[must_use]
    pub fn into_rendered(self) -> Self {
        let Self {
            sql,
            params,
            types,
            prelude,
            postlude,
        } = self;

        let mut rendered = prelude.unwrap_or_default();
        rendered.push_str(&sql);
        if let Some(postlude) = postlude {
            rendered.push_str(&postlude);
        }

        Self {
            sql: rendered,
            params,
            types,
            prelude: None,
            postlude: None,
        }
    }
}

/// A row-returning statement ready for `Connection::execute_query`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    params: Vec<Value>,
    types: Vec<ParameterType>,
    distinct: bool,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            types: Vec::new(),
            distinct: false,
        }
    }

    /// A parameterless query, as issued by `Connection::fetch_all`.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql)
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<Value>, types: Vec<ParameterType>) -> Self {
        self.params = params;
        self.types = types;
        self
    }

    /// Requests row deduplication when the query executes.
    #[must_use]
    pub fn mark_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub const fn is_distinct(&self) -> bool {
        self.distinct
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    #[must_use]
    pub fn types(&self) -> &[ParameterType] {
        &self.types
    }

    /// Replaces the statement text and clears the distinct mark.
    #[must_use]
    pub fn with_rewritten_sql(self, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: self.params,
            types: self.types,
            distinct: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Mutation, Query};

    #[test]
    fn rendered_mutation_folds_prelude_and_postlude_once() {
        let mutation = Mutation::new("INSERT INTO t (id) VALUES (?)")
            .with_prelude("SET X ON; ")
            .with_postlude("; SET X OFF;");

        let rendered = mutation.into_rendered();
        assert_eq!(
            rendered.sql(),
            "SET X ON; INSERT INTO t (id) VALUES (?); SET X OFF;"
        );
        assert!(!rendered.has_pending_sql());

        let again = rendered.clone().into_rendered();
        assert_eq!(again, rendered);
    }

    #[test]
    fn rewritten_query_drops_distinct_mark() {
        let query = Query::raw("SELECT a FROM t").mark_distinct();
        assert!(query.is_distinct());

        let rewritten = query.with_rewritten_sql("SELECT DISTINCT a FROM t");
        assert!(!rewritten.is_distinct());
        assert_eq!(rewritten.sql(), "SELECT DISTINCT a FROM t");
    }
}
