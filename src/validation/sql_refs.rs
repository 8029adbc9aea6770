use sqlparser::ast::{
    BinaryOperator, Expr, ObjectNamePart, Query, SetExpr, Statement, TableFactor, TableWithJoins,
    Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::DataServiceError;

/// SQL analysis for service resolution and push-down.
///
/// This is reference extraction only, not planning: it pulls the virtual
/// table names a query mentions and the simple equality conjuncts of its
/// WHERE clause. Everything else in the statement is opaque to the gateway
/// and travels to the execution engine untouched.
pub struct SqlReferences;

impl SqlReferences {
    /// Validate that the SQL contains only SELECT statements.
    pub fn validate_select_only(sql: &str) -> Result<(), DataServiceError> {
        let statements = Self::parse(sql)
            .map_err(|e| DataServiceError::Boundary(format!("SQL parsing error: {}", e)))?;

        if statements.is_empty() {
            return Err(DataServiceError::Boundary("Empty SQL query".to_string()));
        }

        for stmt in &statements {
            match stmt {
                Statement::Query(_) => {}
                Statement::Insert { .. }
                | Statement::Update { .. }
                | Statement::Delete { .. }
                | Statement::Drop { .. }
                | Statement::CreateTable { .. }
                | Statement::AlterTable { .. } => {
                    return Err(DataServiceError::Boundary(
                        "Only SELECT queries are permitted".to_string(),
                    ));
                }
                other => {
                    return Err(DataServiceError::Boundary(format!(
                        "Only SELECT queries are permitted. Found: {:?}",
                        other
                    )));
                }
            }
        }

        Ok(())
    }

    /// Names of the tables referenced in FROM clauses, joins and
    /// subqueries included, deduplicated in first-appearance order.
    ///
    /// Unparseable SQL yields an empty list so listing callers never fail.
    pub fn table_references(sql: &str) -> Vec<String> {
        let statements = match Self::parse(sql) {
            Ok(statements) => statements,
            Err(_) => return Vec::new(),
        };

        let mut names = Vec::new();
        for stmt in &statements {
            if let Statement::Query(query) = stmt {
                Self::collect_query_tables(query, &mut names);
            }
        }

        let mut seen = std::collections::HashSet::new();
        names.retain(|n| seen.insert(n.clone()));
        names
    }

    /// Simple `column = literal` conjuncts of the top-level WHERE clause.
    /// OR branches and non-equality predicates are ignored; pushing those
    /// down could change results.
    pub fn equality_predicates(sql: &str) -> Vec<(String, String)> {
        let statements = match Self::parse(sql) {
            Ok(statements) => statements,
            Err(_) => return Vec::new(),
        };

        let mut predicates = Vec::new();
        for stmt in &statements {
            if let Statement::Query(query) = stmt {
                if let SetExpr::Select(select) = query.body.as_ref() {
                    if let Some(selection) = &select.selection {
                        Self::collect_equalities(selection, &mut predicates);
                    }
                }
            }
        }
        predicates
    }

    fn parse(sql: &str) -> Result<Vec<Statement>, sqlparser::parser::ParserError> {
        let dialect = GenericDialect {};
        Parser::new(&dialect).try_with_sql(sql)?.parse_statements()
    }

    fn collect_query_tables(query: &Query, out: &mut Vec<String>) {
        Self::collect_set_expr_tables(&query.body, out);
    }

    fn collect_set_expr_tables(body: &SetExpr, out: &mut Vec<String>) {
        match body {
            SetExpr::Select(select) => {
                for table_with_joins in &select.from {
                    Self::collect_relation_tables(table_with_joins, out);
                }
            }
            SetExpr::Query(query) => Self::collect_query_tables(query, out),
            SetExpr::SetOperation { left, right, .. } => {
                Self::collect_set_expr_tables(left, out);
                Self::collect_set_expr_tables(right, out);
            }
            _ => {}
        }
    }

    fn collect_relation_tables(table_with_joins: &TableWithJoins, out: &mut Vec<String>) {
        Self::collect_factor_tables(&table_with_joins.relation, out);
        for join in &table_with_joins.joins {
            Self::collect_factor_tables(&join.relation, out);
        }
    }

    fn collect_factor_tables(factor: &TableFactor, out: &mut Vec<String>) {
        match factor {
            TableFactor::Table { name, .. } => {
                if let Some(part) = name.0.last() {
                    out.push(Self::part_name(part));
                }
            }
            TableFactor::Derived { subquery, .. } => Self::collect_query_tables(subquery, out),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => Self::collect_relation_tables(table_with_joins, out),
            _ => {}
        }
    }

    fn part_name(part: &ObjectNamePart) -> String {
        match part {
            ObjectNamePart::Identifier(ident) => ident.value.clone(),
            other => other.to_string(),
        }
    }

    fn collect_equalities(expr: &Expr, out: &mut Vec<(String, String)>) {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                Self::collect_equalities(left, out);
                Self::collect_equalities(right, out);
            }
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            } => {
                if let (Some(column), Some(literal)) =
                    (Self::column_name(left), Self::literal_text(right))
                {
                    out.push((column, literal));
                } else if let (Some(column), Some(literal)) =
                    (Self::column_name(right), Self::literal_text(left))
                {
                    out.push((column, literal));
                }
            }
            Expr::Nested(inner) => Self::collect_equalities(inner, out),
            _ => {}
        }
    }

    fn column_name(expr: &Expr) -> Option<String> {
        match expr {
            Expr::Identifier(ident) => Some(ident.value.clone()),
            Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.clone()),
            _ => None,
        }
    }

    fn literal_text(expr: &Expr) -> Option<String> {
        match expr {
            Expr::Value(value) => match &value.value {
                Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => Some(s.clone()),
                Value::Number(n, _) => Some(n.clone()),
                Value::Boolean(b) => Some(b.to_string()),
                _ => None,
            },
            _ => None,
        }
    }
}
