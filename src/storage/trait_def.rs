use crate::models::VisitorRecord;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("visit counter store error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CounterResult<T> = Result<T, CounterError>;

/// Persistent per-visitor request counter.
///
/// Implementations must make `get_and_increment` atomic for concurrent callers
/// sharing a key, and must keep values across process restarts.
#[async_trait]
pub trait VisitCounter: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Increment the counter for `visitor` and return the new value.
    /// A visitor seen for the first time gets a count of 1.
    async fn get_and_increment(&self, visitor: &str) -> CounterResult<i64>;

    /// Current count without touching it
    async fn get(&self, visitor: &str) -> CounterResult<Option<i64>>;

    /// Forget a visitor; returns whether a record existed
    async fn reset(&self, visitor: &str) -> CounterResult<bool>;

    /// Most frequent visitors, highest count first
    async fn top(&self, limit: i64) -> CounterResult<Vec<VisitorRecord>>;
}
