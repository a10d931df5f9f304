//! PostgreSQL rendering of search queries using SeaQuery.
//!
//! Targets a flattened index table per search index:
//! `search_index_<index>(item_id, datasource, bundle, langcode, entity_id,
//! fields JSONB, search_vector TSVECTOR)`.

use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr,
};

use super::{
    BUNDLE_FIELD, Condition, ConditionGroup, ConditionNode, ConditionOperator, ConditionValue,
    Conjunction, DATASOURCE_FIELD, IndexFieldType, IndexInfo, LANGUAGE_FIELD, LINK_SOURCE_ID_FIELD,
    RELEVANCE_FIELD, SearchQuery, SortDirection,
};

/// Table name for an index.
pub fn index_table(index_id: &str) -> String {
    format!("search_index_{index_id}")
}

/// Whether a name is safe to splice into SQL as an identifier or JSON key.
fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Table column backing a built-in field.
fn builtin_column(field: &str) -> Option<&'static str> {
    match field {
        DATASOURCE_FIELD => Some("datasource"),
        BUNDLE_FIELD => Some("bundle"),
        LANGUAGE_FIELD => Some("langcode"),
        LINK_SOURCE_ID_FIELD => Some("entity_id"),
        _ => None,
    }
}

/// Compiles a [`SearchQuery`] into SQL.
pub struct SqlQueryCompiler<'a> {
    index: &'a IndexInfo,
    query: &'a SearchQuery,
}

impl<'a> SqlQueryCompiler<'a> {
    pub fn new(index: &'a IndexInfo, query: &'a SearchQuery) -> Self {
        Self { index, query }
    }

    fn table(&self) -> String {
        index_table(&self.index.id)
    }

    /// Build the SELECT with sorts and range applied.
    pub fn build(&self) -> String {
        let mut query = Query::select();

        query.columns([
            Alias::new("item_id"),
            Alias::new("datasource"),
            Alias::new("entity_id"),
            Alias::new("langcode"),
        ]);
        query.from(Alias::new(self.table()));

        self.add_where(&mut query);
        self.add_sorts(&mut query);

        if let Some(limit) = self.query.limit {
            query.limit(limit as u64);
        }
        if self.query.offset > 0 {
            query.offset(self.query.offset as u64);
        }

        query.to_string(PostgresQueryBuilder)
    }

    /// Build a COUNT query for the total result count.
    pub fn build_count(&self) -> String {
        let mut query = Query::select();
        query.expr(Expr::col(Asterisk).count());
        query.from(Alias::new(self.table()));
        self.add_where(&mut query);
        query.to_string(PostgresQueryBuilder)
    }

    fn add_where(&self, query: &mut SelectStatement) {
        if !is_safe_identifier(&self.index.id) {
            tracing::warn!(index = %self.index.id, "unsafe index id; restricting results");
            query.and_where(Expr::cust("FALSE"));
            return;
        }

        if let Some(expr) = self.group_expr(&self.query.root) {
            query.and_where(expr);
        }

        if let Some(languages) = &self.query.languages {
            query.and_where(Expr::col(Alias::new("langcode")).is_in(languages.clone()));
        }

        if let Some(expr) = self.keys_expr() {
            query.and_where(expr);
        }
    }

    fn group_expr(&self, group: &ConditionGroup) -> Option<SimpleExpr> {
        if group.is_empty() {
            return None;
        }
        let mut cond = match group.conjunction {
            Conjunction::And => Cond::all(),
            Conjunction::Or => Cond::any(),
        };
        for node in &group.conditions {
            match node {
                ConditionNode::Condition(c) => cond = cond.add(self.condition_expr(c)),
                ConditionNode::Group(g) => {
                    if let Some(expr) = self.group_expr(g) {
                        cond = cond.add(expr);
                    }
                }
            }
        }
        Some(cond.into())
    }

    /// Expression for a field: a table column for built-in fields, JSONB text otherwise.
    fn field_expr(&self, field: &str) -> Option<SimpleExpr> {
        if let Some(column) = builtin_column(field) {
            return Some(Expr::col(Alias::new(column)).into());
        }
        if !is_safe_identifier(field) {
            return None;
        }
        Some(if self.is_numeric(field) {
            Expr::cust(format!("(fields->>'{field}')::numeric"))
        } else {
            Expr::cust(format!("fields->>'{field}'"))
        })
    }

    fn is_numeric(&self, field: &str) -> bool {
        self.index.field_type(field).is_some_and(IndexFieldType::is_numeric)
    }

    fn condition_expr(&self, condition: &Condition) -> SimpleExpr {
        let Some(field) = self.field_expr(&condition.field) else {
            tracing::warn!(field = %condition.field, "unsafe field name; restricting results");
            return Expr::cust("FALSE");
        };

        // A missing JSONB key is NULL, and `<>` or `NOT IN` never match NULL.
        let negated =
            matches!(condition.operator, ConditionOperator::Ne | ConditionOperator::NotIn);
        if negated
            && !matches!(condition.value, ConditionValue::Null)
            && builtin_column(&condition.field).is_none()
        {
            let missing = field.clone().is_null();
            return Cond::any()
                .add(self.compare_expr(field, condition))
                .add(missing)
                .into();
        }
        self.compare_expr(field, condition)
    }

    fn compare_expr(&self, field: SimpleExpr, condition: &Condition) -> SimpleExpr {
        match (&condition.value, condition.operator) {
            (ConditionValue::Null, ConditionOperator::Eq) => field.is_null(),
            (ConditionValue::Null, ConditionOperator::Ne) => field.is_not_null(),
            (ConditionValue::Null, _) => Expr::cust("FALSE"),
            (value, ConditionOperator::In | ConditionOperator::NotIn) => {
                let values = value.as_list();
                let negate = condition.operator == ConditionOperator::NotIn;
                match (values.is_empty(), negate) {
                    (true, false) => Expr::cust("FALSE"),
                    (true, true) => Expr::cust("TRUE"),
                    (false, _) => self.in_expr(field, &condition.field, values, negate),
                }
            }
            (value, operator) => {
                let Some(text) = value.as_text() else {
                    return Expr::cust("FALSE");
                };
                let literal = self.literal(&condition.field, text);
                match operator {
                    ConditionOperator::Eq => field.eq(literal),
                    ConditionOperator::Ne => field.ne(literal),
                    ConditionOperator::Gt => field.gt(literal),
                    ConditionOperator::Lt => field.lt(literal),
                    ConditionOperator::Gte => field.gte(literal),
                    _ => field.lte(literal),
                }
            }
        }
    }

    /// Numeric fields compare against numbers when the value parses as one.
    fn literal(&self, field: &str, value: String) -> SimpleExpr {
        if self.is_numeric(field)
            && let Ok(number) = value.parse::<i64>()
        {
            return Expr::val(number).into();
        }
        Expr::val(value).into()
    }

    fn in_expr(
        &self,
        expr: SimpleExpr,
        field: &str,
        values: Vec<String>,
        negate: bool,
    ) -> SimpleExpr {
        if self.is_numeric(field) {
            let numbers: Result<Vec<i64>, _> = values.iter().map(|v| v.parse::<i64>()).collect();
            if let Ok(numbers) = numbers {
                return if negate {
                    expr.is_not_in(numbers)
                } else {
                    expr.is_in(numbers)
                };
            }
        }
        if negate {
            expr.is_not_in(values)
        } else {
            expr.is_in(values)
        }
    }

    fn keys_expr(&self) -> Option<SimpleExpr> {
        if self.query.keys.is_empty() {
            return None;
        }
        let keys = self.query.keys.join(" ");
        match &self.query.fulltext_fields {
            None => Some(Expr::cust_with_values(
                "search_vector @@ plainto_tsquery('simple', $1)",
                [keys],
            )),
            Some(fields) => {
                let mut cond = Cond::any();
                for field in fields.iter().filter(|f| is_safe_identifier(f)) {
                    let vector = format!("to_tsvector('simple', coalesce(fields->>'{field}', ''))");
                    cond = cond.add(Expr::cust_with_values(
                        format!("{vector} @@ plainto_tsquery('simple', $1)"),
                        [keys.clone()],
                    ));
                }
                Some(cond.into())
            }
        }
    }

    fn add_sorts(&self, query: &mut SelectStatement) {
        for sort in &self.query.sorts {
            let order = match sort.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            if sort.field == RELEVANCE_FIELD {
                if !self.query.keys.is_empty() {
                    query.order_by_expr(
                        Expr::cust_with_values(
                            "ts_rank(search_vector, plainto_tsquery('simple', $1))",
                            [self.query.keys.join(" ")],
                        ),
                        order,
                    );
                }
                continue;
            }
            if let Some(expr) = self.field_expr(&sort.field) {
                query.order_by_expr(expr, order);
            }
        }
    }
}
