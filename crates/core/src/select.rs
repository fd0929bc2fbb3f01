use crate::{ParameterType, QueryBuilder, Row, SortOrder, Value};

/// A single-table SELECT described by columns, equality criteria, grouping
/// and sorting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectRequest {
    pub table: String,
    pub columns: Vec<String>,
    pub criteria: Row,
    pub group_by: Vec<String>,
    pub order_by: Vec<(String, SortOrder)>,
}

impl SelectRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.criteria.insert(column.into(), value.into());
        self
    }

    #[must_use]
    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    #[must_use]
    pub fn to_builder(&self) -> QueryBuilder {
        let mut builder = QueryBuilder::new();
        builder
            .select(self.columns.iter().map(String::as_str))
            .from(self.table.as_str());

        for (column, value) in &self.criteria {
            if value.is_null() {
                builder.and_where(format!("{column} IS NULL"));
            } else {
                builder
                    .and_where(format!("{column} = ?"))
                    .set_parameter(value.clone(), ParameterType::infer(value));
            }
        }

        builder.group_by(self.group_by.iter().map(String::as_str));
        for (column, order) in &self.order_by {
            builder.add_order_by(column, *order);
        }

        builder
    }
}

#[cfg(test)]
mod tests {
    use super::SelectRequest;
    use crate::{SortOrder, Value};

    #[test]
    fn to_builder_binds_criteria_and_skips_null_parameters() {
        let request = SelectRequest::new("[events]")
            .columns(["[events].[uid]", "[events].[title]"])
            .where_eq("[events].[deleted_at]", Value::Null)
            .where_eq("[events].[owner]", 7)
            .order_by("[events].[title]", SortOrder::Asc);

        let builder = request.to_builder();
        assert_eq!(
            builder.to_sql().expect("request should render"),
            "SELECT [events].[uid], [events].[title] FROM [events] \
             WHERE [events].[deleted_at] IS NULL AND [events].[owner] = ? \
             ORDER BY [events].[title] ASC"
        );
        assert_eq!(builder.params(), &[Value::Int(7)]);
    }
}
