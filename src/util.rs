use postgres::types::ToSql;

pub type SqlArg = Box<dyn ToSql + Sync + Send>;

enum Clause {
    Eq(String),
    Any(String),
    IsNull(String),
    IsNotNull(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilteredOperation {
    Select,
    SelectForUpdate,
    Delete,
}

/// Builds `SELECT`/`DELETE` statements with a conjunction of filters.
pub struct FilteredOperationBuilder {
    table: &'static str,
    clauses: Vec<(Clause, Option<SqlArg>)>,
    extra: Option<String>,
}

impl FilteredOperationBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            clauses: Default::default(),
            extra: None,
        }
    }

    pub fn with_filter<K: Into<String>, V: ToSql + Sync + Send + 'static>(mut self, k: K, v: V) -> Self {
        self.clauses.push((Clause::Eq(k.into()), Some(Box::new(v))));
        self
    }

    /// Matches any of the values, rendered as `col = ANY($n)`.
    pub fn with_any<K: Into<String>, V: ToSql + Sync + Send + 'static>(mut self, k: K, v: Vec<V>) -> Self {
        self.clauses.push((Clause::Any(k.into()), Some(Box::new(v))));
        self
    }

    pub fn with_null<K: Into<String>>(mut self, k: K) -> Self {
        self.clauses.push((Clause::IsNull(k.into()), None));
        self
    }

    pub fn with_not_null<K: Into<String>>(mut self, k: K) -> Self {
        self.clauses.push((Clause::IsNotNull(k.into()), None));
        self
    }

    pub fn with_extra<S: Into<String>>(mut self, extra: S) -> Self {
        self.extra = Some(extra.into());
        self
    }

    fn write_where(clauses: Vec<(Clause, Option<SqlArg>)>, query: &mut String, args: &mut Vec<SqlArg>) {
        for (i, (clause, arg)) in clauses.into_iter().enumerate() {
            query.push_str(if i == 0 { " WHERE " } else { " AND " });
            match clause {
                Clause::Eq(col) => query.push_str(&format!("{} = ${}", col, args.len() + 1)),
                Clause::Any(col) => query.push_str(&format!("{} = ANY(${})", col, args.len() + 1)),
                Clause::IsNull(col) => query.push_str(&format!("{} IS NULL", col)),
                Clause::IsNotNull(col) => query.push_str(&format!("{} IS NOT NULL", col)),
            }
            if let Some(arg) = arg {
                args.push(arg);
            }
        }
    }

    pub fn build(self, op: FilteredOperation) -> (String, Vec<SqlArg>) {
        let mut args = vec![];
        let mut query = format!(
            "{} {}",
            match op {
                FilteredOperation::Select | FilteredOperation::SelectForUpdate => "SELECT * FROM",
                FilteredOperation::Delete => "DELETE FROM",
            },
            self.table
        );
        Self::write_where(self.clauses, &mut query, &mut args);
        if op != FilteredOperation::Delete {
            if let Some(extra) = self.extra {
                query.push(' ');
                query.push_str(&extra);
            }
        }
        match op {
            FilteredOperation::SelectForUpdate => query.push_str(" FOR UPDATE NOWAIT"),
            FilteredOperation::Delete => query.push_str(" RETURNING *"),
            FilteredOperation::Select => {}
        }
        query.push(';');

        (query, args)
    }
}

pub struct InsertBuilder {
    table: &'static str,
    values: Vec<(String, SqlArg)>,
}

impl InsertBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            values: Default::default(),
        }
    }

    pub fn with_arg<K: Into<String>, V: ToSql + Sync + Send + 'static>(mut self, k: K, v: V) -> Self {
        self.values.push((k.into(), Box::new(v)));
        self
    }

    pub fn build(self) -> (String, Vec<SqlArg>) {
        let mut columns = vec![];
        let mut placeholders = vec![];
        let mut args = vec![];
        for (i, (col, arg)) in self.values.into_iter().enumerate() {
            columns.push(col);
            placeholders.push(format!("${}", i + 1));
            args.push(arg);
        }

        (
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *;",
                self.table,
                columns.join(", "),
                placeholders.join(", ")
            ),
            args,
        )
    }
}

pub struct UpdateBuilder {
    filter: FilteredOperationBuilder,
    values: Vec<(String, SqlArg)>,
}

impl From<FilteredOperationBuilder> for UpdateBuilder {
    fn from(filter: FilteredOperationBuilder) -> Self {
        Self {
            filter,
            values: Default::default(),
        }
    }
}

impl UpdateBuilder {
    pub fn with_value<K: Into<String>, V: ToSql + Sync + Send + 'static>(mut self, k: K, v: V) -> Self {
        self.values.push((k.into(), Box::new(v)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders `UPDATE`; with nothing to set it degrades into a plain select over the same filter.
    pub fn build(self) -> (String, Vec<SqlArg>) {
        if self.values.is_empty() {
            return self.filter.build(FilteredOperation::Select);
        }

        let mut args = vec![];
        let mut assignments = vec![];
        for (col, arg) in self.values {
            args.push(arg);
            assignments.push(format!("{} = ${}", col, args.len()));
        }
        let mut query = format!("UPDATE {} SET {}", self.filter.table, assignments.join(", "));
        FilteredOperationBuilder::write_where(self.filter.clauses, &mut query, &mut args);
        query.push_str(" RETURNING *;");

        (query, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_numbers_placeholders_from_one() {
        let (query, args) = FilteredOperationBuilder::new("orderrecipemapping")
            .with_filter("order_id", 7)
            .with_filter("week", 2)
            .with_null("payment_id")
            .with_extra("ORDER BY week, mapping_id")
            .build(FilteredOperation::Select);

        assert_eq!(
            query,
            "SELECT * FROM orderrecipemapping WHERE order_id = $1 AND week = $2 AND payment_id IS NULL ORDER BY week, mapping_id;"
        );
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn select_for_update_locks_without_waiting() {
        let (query, _) = FilteredOperationBuilder::new("orderdetails")
            .with_filter("order_id", 7)
            .build(FilteredOperation::SelectForUpdate);

        assert_eq!(query, "SELECT * FROM orderdetails WHERE order_id = $1 FOR UPDATE NOWAIT;");
    }

    #[test]
    fn delete_returns_rows_and_ignores_ordering() {
        let (query, _) = FilteredOperationBuilder::new("recipes")
            .with_any("category_id", vec![1, 2])
            .with_extra("ORDER BY recipe_id")
            .build(FilteredOperation::Delete);

        assert_eq!(query, "DELETE FROM recipes WHERE category_id = ANY($1) RETURNING *;");
    }

    #[test]
    fn insert_lists_columns_in_order() {
        let (query, args) = InsertBuilder::new("snacks_mapping")
            .with_arg("order_id", 1)
            .with_arg("week", 2)
            .with_arg("portion", 3)
            .build();

        assert_eq!(
            query,
            "INSERT INTO snacks_mapping (order_id, week, portion) VALUES ($1, $2, $3) RETURNING *;"
        );
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn update_numbers_values_before_filters() {
        let (query, args) = UpdateBuilder::from(
            FilteredOperationBuilder::new("orderdetails")
                .with_filter("order_id", 7)
                .with_null("subscription_id"),
        ).with_value("subscription_id", "sub_1".to_string())
        .build();

        assert_eq!(
            query,
            "UPDATE orderdetails SET subscription_id = $1 WHERE order_id = $2 AND subscription_id IS NULL RETURNING *;"
        );
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn empty_update_degrades_to_select() {
        let b = UpdateBuilder::from(FilteredOperationBuilder::new("orderdetails").with_filter("order_id", 7));
        assert!(b.is_empty());
        let (query, _) = b.build();

        assert_eq!(query, "SELECT * FROM orderdetails WHERE order_id = $1;");
    }
}
