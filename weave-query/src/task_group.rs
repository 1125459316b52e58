//! Scatter/gather over independent tasks, and a bounded persistence wrapper.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::trace;

use crate::error::{QueryError, QueryResult};
use crate::store::{Persistence, Row, Transaction};
use crate::value::Value;

/// Run every task concurrently and collect the results in input order.
///
/// All tasks are driven to completion even after a failure, so nothing is
/// left in flight when this returns. The first error to complete wins.
pub async fn gather<T, Fut>(tasks: impl IntoIterator<Item = Fut>) -> QueryResult<Vec<T>>
where
    Fut: Future<Output = QueryResult<T>>,
{
    let mut futures: FuturesUnordered<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(task_id, task)| async move { (task_id, task.await) })
        .collect();

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(futures.len()).collect();
    let mut first_error = None;

    while let Some((task_id, result)) = futures.next().await {
        match result {
            Ok(value) => slots[task_id] = Some(value),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| QueryError::internal("task produced no result")))
        .collect()
}

/// A [`Persistence`] wrapper that caps the number of calls in flight.
///
/// Permits are held only for the duration of a single call, never across a
/// recursive resolve, so nested fan-out cannot deadlock on the pool.
pub struct LimitedStore {
    inner: Arc<dyn Persistence>,
    permits: Semaphore,
    capacity: usize,
}

impl LimitedStore {
    /// Wrap `inner`, allowing at most `capacity` concurrent calls.
    pub fn new(inner: Arc<dyn Persistence>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Maximum number of concurrent calls.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn acquire(&self) -> QueryResult<SemaphorePermit<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| QueryError::internal(format!("permit pool closed: {}", e)))?;
        trace!(available = self.permits.available_permits(), "Acquired persistence permit");
        Ok(permit)
    }
}

#[async_trait]
impl Persistence for LimitedStore {
    async fn query(&self, sql: &str, args: &[Value]) -> QueryResult<Vec<Row>> {
        let _permit = self.acquire().await?;
        self.inner.query(sql, args).await
    }

    async fn query_row(&self, sql: &str, args: &[Value]) -> QueryResult<Option<Row>> {
        let _permit = self.acquire().await?;
        self.inner.query_row(sql, args).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> QueryResult<u64> {
        let _permit = self.acquire().await?;
        self.inner.exec(sql, args).await
    }

    async fn begin(&self) -> QueryResult<Box<dyn Transaction>> {
        self.inner.begin().await
    }
}
