//! Parameterized SQL statements and the builders that assemble them.
//!
//! Caller-supplied values only ever travel as bound parameters. Identifiers
//! are validated and quoted; a JSON `null` is rendered as the SQL literal
//! `NULL` so it coerces to whatever type the target column has.

use serde_json::Value;

use crate::filter::error::FilterError;
use crate::filter::filter::{quote_identifier, validate_identifier};
use crate::filter::types::SqlResult;

/// A single SQL statement with its positional (`$n`) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
    returns_rows: bool,
    /// ORDER BY over output column names, reapplied when rows are wrapped
    output_order: Option<String>,
}

impl Statement {
    /// Statement that yields rows (SELECT, or a write with RETURNING).
    pub fn query(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), params: vec![], returns_rows: true, output_order: None }
    }

    /// Statement evaluated for its affected-row count only.
    pub fn command(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), params: vec![], returns_rows: false, output_order: None }
    }

    /// Append the value for the next `$n` placeholder written in the SQL.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn returns_rows(&self) -> bool {
        self.returns_rows
    }

    pub fn output_order(&self) -> Option<&str> {
        self.output_order.as_deref()
    }
}

impl From<SqlResult> for Statement {
    fn from(result: SqlResult) -> Self {
        let output_order = Some(result.order).filter(|o| !o.is_empty());
        Self { sql: result.query, params: result.params, returns_rows: true, output_order }
    }
}

/// Hands out `$n` placeholders in order.
#[derive(Debug, Default)]
struct Params {
    values: Vec<Value>,
}

impl Params {
    fn placeholder(&mut self, value: Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.values.push(value);
        format!("${}", self.values.len())
    }
}

/// Column value: either bound or a fixed SQL expression such as `NOW()`.
#[derive(Debug, Clone)]
enum ColumnValue {
    Bound(Value),
    Expression(&'static str),
}

/// Builds `INSERT INTO "table" (...) VALUES (...) [RETURNING ...]`.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<(String, ColumnValue)>,
    returning: Vec<String>,
}

impl InsertBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), columns: vec![], returning: vec![] }
    }

    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((column.into(), ColumnValue::Bound(value.into())));
        self
    }

    pub fn expression(mut self, column: impl Into<String>, expression: &'static str) -> Self {
        self.columns.push((column.into(), ColumnValue::Expression(expression)));
        self
    }

    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn build(self) -> Result<Statement, FilterError> {
        validate_identifier(&self.table)?;
        if self.columns.is_empty() {
            return Err(FilterError::InvalidColumn(format!("INSERT into {} has no columns", self.table)));
        }

        let mut params = Params::default();
        let mut names = Vec::with_capacity(self.columns.len());
        let mut values = Vec::with_capacity(self.columns.len());
        for (column, value) in self.columns {
            validate_identifier(&column)?;
            names.push(quote_identifier(&column));
            values.push(match value {
                ColumnValue::Bound(v) => params.placeholder(v),
                ColumnValue::Expression(expr) => expr.to_string(),
            });
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(&self.table),
            names.join(", "),
            values.join(", ")
        );

        let returns_rows = !self.returning.is_empty();
        if returns_rows {
            sql.push_str(&format!(" RETURNING {}", render_columns(&self.returning)?));
        }

        Ok(Statement { sql, params: params.values, returns_rows, output_order: None })
    }
}

/// Builds `UPDATE "table" SET ... WHERE ...` from the columns actually set.
///
/// Only columns passed to [`UpdateBuilder::set`] appear in the statement, so
/// a partial update touches nothing the caller did not supply.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    assignments: Vec<(String, ColumnValue)>,
    conditions: Vec<(String, Value)>,
    returning: Vec<String>,
}

impl UpdateBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into(), assignments: vec![], conditions: vec![], returning: vec![] }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), ColumnValue::Bound(value.into())));
        self
    }

    /// Set the column only when a value was supplied.
    pub fn set_opt<V: Into<Value>>(self, column: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn expression(mut self, column: impl Into<String>, expression: &'static str) -> Self {
        self.assignments.push((column.into(), ColumnValue::Expression(expression)));
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn returning(mut self, columns: &[&str]) -> Self {
        self.returning = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn build(self) -> Result<Statement, FilterError> {
        validate_identifier(&self.table)?;
        if self.assignments.is_empty() {
            return Err(FilterError::InvalidColumn(format!("UPDATE of {} sets no columns", self.table)));
        }
        if self.conditions.is_empty() {
            return Err(FilterError::InvalidWhereClause(format!("UPDATE of {} has no WHERE condition", self.table)));
        }

        let mut params = Params::default();
        let mut sets = Vec::with_capacity(self.assignments.len());
        for (column, value) in self.assignments {
            validate_identifier(&column)?;
            let rendered = match value {
                ColumnValue::Bound(v) => params.placeholder(v),
                ColumnValue::Expression(expr) => expr.to_string(),
            };
            sets.push(format!("{} = {}", quote_identifier(&column), rendered));
        }

        let mut wheres = Vec::with_capacity(self.conditions.len());
        for (column, value) in self.conditions {
            validate_identifier(&column)?;
            if value.is_null() {
                wheres.push(format!("{} IS NULL", quote_identifier(&column)));
            } else {
                wheres.push(format!("{} = {}", quote_identifier(&column), params.placeholder(value)));
            }
        }

        let mut sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(&self.table),
            sets.join(", "),
            wheres.join(" AND ")
        );

        let returns_rows = !self.returning.is_empty();
        if returns_rows {
            sql.push_str(&format!(" RETURNING {}", render_columns(&self.returning)?));
        }

        Ok(Statement { sql, params: params.values, returns_rows, output_order: None })
    }
}

fn render_columns(columns: &[String]) -> Result<String, FilterError> {
    let mut out = Vec::with_capacity(columns.len());
    for column in columns {
        if column == "*" {
            out.push("*".to_string());
            continue;
        }
        validate_identifier(column)?;
        out.push(quote_identifier(column));
    }
    Ok(out.join(", "))
}
