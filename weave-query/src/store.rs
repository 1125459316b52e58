//! Persistence seam consumed by the engine.
//!
//! The engine only composes statement text and arguments; executing them is
//! the job of a [`Persistence`] implementation (see `weave-sqlite`).
//! Placeholders are written as `$1, $2, ...` in argument order.

use async_trait::async_trait;

use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// A result row, values in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from its values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get the value at a column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get the value at a column index, failing if the row is too short.
    pub fn value(&self, index: usize) -> QueryResult<&Value> {
        self.values.get(index).ok_or_else(|| {
            QueryError::decode(
                format!("column {}", index),
                format!("row has only {} columns", self.values.len()),
            )
        })
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take the values out of the row.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// A composed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `$n` placeholders.
    pub sql: String,
    /// Positional arguments.
    pub args: Vec<Value>,
}

impl Statement {
    /// Create a statement.
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Executes composed statements against storage.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Run a query and return every row.
    async fn query(&self, sql: &str, args: &[Value]) -> QueryResult<Vec<Row>>;

    /// Run a query and return the first row, if any.
    async fn query_row(&self, sql: &str, args: &[Value]) -> QueryResult<Option<Row>> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    /// Run a statement and return the number of affected rows.
    async fn exec(&self, sql: &str, args: &[Value]) -> QueryResult<u64>;

    /// Open a transaction.
    async fn begin(&self) -> QueryResult<Box<dyn Transaction>>;
}

/// A transaction opened by [`Persistence::begin`].
///
/// Dropping a transaction without calling `commit` or `rollback` leaves its
/// outcome to the implementation.
#[async_trait]
pub trait Transaction: Send {
    /// Run a query inside the transaction.
    async fn query(&mut self, sql: &str, args: &[Value]) -> QueryResult<Vec<Row>>;

    /// Run a statement inside the transaction.
    async fn exec(&mut self, sql: &str, args: &[Value]) -> QueryResult<u64>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> QueryResult<()>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> QueryResult<()>;
}
