use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgArguments, PgPool, Postgres, Row as _};

use super::manager::DatabaseError;
use super::statement::Statement;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl QueryOutcome {
    pub fn rows(rows: Vec<Row>) -> Self {
        let rows_affected = rows.len() as u64;
        Self { rows, rows_affected }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self { rows: vec![], rows_affected }
    }
}

/// Runs parameterized statements against the relational store.
///
/// Implementations report a missing table or column as
/// [`DatabaseError::ObjectNotFound`] so callers can tell it apart from other
/// failures. Nothing is retried.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn run(&self, statement: &Statement) -> Result<QueryOutcome, DatabaseError>;

    /// Run every statement in one transaction; the first failure rolls back
    /// the whole batch.
    async fn run_atomic(&self, statements: &[Statement]) -> Result<Vec<QueryOutcome>, DatabaseError>;

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, DatabaseError> {
        Ok(self.run(statement).await?.rows)
    }

    async fn fetch_optional(&self, statement: &Statement) -> Result<Option<Row>, DatabaseError> {
        Ok(self.run(statement).await?.rows.into_iter().next())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, DatabaseError> {
        Ok(self.run(statement).await?.rows_affected)
    }
}

/// PostgreSQL executor over the shared connection pool.
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
    log_queries: bool,
}

impl PgExecutor {
    pub fn new(pool: PgPool, log_queries: bool) -> Self {
        Self { pool, log_queries }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn log(&self, statement: &Statement) {
        if self.log_queries {
            tracing::debug!(sql = statement.sql(), params = statement.params().len(), "executing statement");
        }
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn run(&self, statement: &Statement) -> Result<QueryOutcome, DatabaseError> {
        self.log(statement);
        run_on(&self.pool, statement).await
    }

    async fn run_atomic(&self, statements: &[Statement]) -> Result<Vec<QueryOutcome>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(statements.len());
        for statement in statements {
            self.log(statement);
            // Dropping the transaction on error rolls it back
            outcomes.push(run_on(&mut *tx, statement).await?);
        }
        tx.commit().await?;
        Ok(outcomes)
    }
}

async fn run_on<'c, E>(executor: E, statement: &Statement) -> Result<QueryOutcome, DatabaseError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    if statement.returns_rows() {
        // row_to_json keeps column names and types without per-type decoding.
        // The wrapper does not inherit the inner ORDER BY, so it is repeated.
        let sql = wrap_rows(statement);
        let mut q = sqlx::query(&sql);
        for p in statement.params() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(executor).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row.try_get::<Value, _>("row")? {
                Value::Object(map) => out.push(map),
                other => {
                    return Err(DatabaseError::QueryError(format!("unexpected row format: {}", other)));
                }
            }
        }
        Ok(QueryOutcome::rows(out))
    } else {
        let mut q = sqlx::query(statement.sql());
        for p in statement.params() {
            q = bind_param(q, p);
        }
        let result = q.execute(executor).await?;
        Ok(QueryOutcome::affected(result.rows_affected()))
    }
}

fn wrap_rows(statement: &Statement) -> String {
    match statement.output_order() {
        Some(order) => format!("WITH t AS ({}) SELECT row_to_json(t) AS row FROM t {}", statement.sql(), order),
        None => format!("WITH t AS ({}) SELECT row_to_json(t) AS row FROM t", statement.sql()),
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}
