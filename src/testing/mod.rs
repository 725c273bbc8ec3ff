//! In-process query executor for tests.
//!
//! Replies are scripted per SQL fragment and every statement is recorded so a
//! test can assert on exactly what would have reached the database.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

use crate::database::{DatabaseError, QueryExecutor, QueryOutcome, Row, Statement};

/// Scripted response for statements matching a fragment.
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(Vec<Row>),
    Affected(u64),
    /// Missing table or column
    ObjectNotFound,
    Failure(String),
}

impl Reply {
    /// Rows from JSON objects; anything else is skipped.
    pub fn rows(values: Vec<Value>) -> Self {
        Reply::Rows(
            values
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
        )
    }

    pub fn row(value: Value) -> Self {
        Reply::rows(vec![value])
    }

    pub fn empty() -> Self {
        Reply::Rows(vec![])
    }
}

#[derive(Debug, Clone)]
struct Rule {
    fragment: String,
    reply: Reply,
    once: bool,
}

#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<Statement>>,
    batches: Mutex<Vec<usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to every statement whose SQL contains `fragment`. Rules are
    /// tried in the order they were added.
    pub fn on(self, fragment: impl Into<String>, reply: Reply) -> Self {
        lock(&self.rules).push(Rule { fragment: fragment.into(), reply, once: false });
        self
    }

    /// Like [`ScriptedExecutor::on`], but the rule is consumed by its first match.
    pub fn once(self, fragment: impl Into<String>, reply: Reply) -> Self {
        lock(&self.rules).push(Rule { fragment: fragment.into(), reply, once: true });
        self
    }

    /// Every statement seen so far, in execution order.
    pub fn statements(&self) -> Vec<Statement> {
        lock(&self.log).clone()
    }

    /// Statements whose SQL contains `fragment`.
    pub fn matching(&self, fragment: &str) -> Vec<Statement> {
        lock(&self.log).iter().filter(|s| s.sql().contains(fragment)).cloned().collect()
    }

    pub fn executed(&self, fragment: &str) -> bool {
        !self.matching(fragment).is_empty()
    }

    /// Size of each batch passed to `run_atomic`.
    pub fn atomic_batches(&self) -> Vec<usize> {
        lock(&self.batches).clone()
    }

    fn reply_for(&self, statement: &Statement) -> Reply {
        lock(&self.log).push(statement.clone());

        let mut rules = lock(&self.rules);
        let Some(index) = rules.iter().position(|r| statement.sql().contains(&r.fragment)) else {
            return Reply::empty();
        };
        if rules[index].once {
            rules.remove(index).reply
        } else {
            rules[index].reply.clone()
        }
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn run(&self, statement: &Statement) -> Result<QueryOutcome, DatabaseError> {
        match self.reply_for(statement) {
            Reply::Rows(rows) => Ok(QueryOutcome::rows(rows)),
            Reply::Affected(n) => Ok(QueryOutcome::affected(n)),
            Reply::ObjectNotFound => Err(DatabaseError::ObjectNotFound(format!("relation in '{}'", statement.sql()))),
            Reply::Failure(message) => Err(DatabaseError::QueryError(message)),
        }
    }

    async fn run_atomic(&self, statements: &[Statement]) -> Result<Vec<QueryOutcome>, DatabaseError> {
        lock(&self.batches).push(statements.len());
        let mut outcomes = Vec::with_capacity(statements.len());
        for statement in statements {
            outcomes.push(self.run(statement).await?);
        }
        Ok(outcomes)
    }
}
