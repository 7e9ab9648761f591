use crate::models::VisitorRecord;
use crate::storage::{CounterResult, VisitCounter};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Close the pool, flushing the database file
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VisitCounter for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitor_visits (
                visitor TEXT PRIMARY KEY NOT NULL,
                visits INTEGER NOT NULL DEFAULT 0,
                first_seen_at INTEGER NOT NULL,
                last_seen_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_visitor_visits_visits ON visitor_visits(visits)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get_and_increment(&self, visitor: &str) -> CounterResult<i64> {
        let now = chrono::Utc::now().timestamp();

        let visits = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO visitor_visits (visitor, visits, first_seen_at, last_seen_at)
            VALUES (?, 1, ?, ?)
            ON CONFLICT(visitor) DO UPDATE SET
                visits = visitor_visits.visits + 1,
                last_seen_at = excluded.last_seen_at
            RETURNING visits
            "#,
        )
        .bind(visitor)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(visits)
    }

    async fn get(&self, visitor: &str) -> CounterResult<Option<i64>> {
        let visits = sqlx::query_scalar::<_, i64>(
            "SELECT visits FROM visitor_visits WHERE visitor = ?",
        )
        .bind(visitor)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(visits)
    }

    async fn reset(&self, visitor: &str) -> CounterResult<bool> {
        let result = sqlx::query("DELETE FROM visitor_visits WHERE visitor = ?")
            .bind(visitor)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn top(&self, limit: i64) -> CounterResult<Vec<VisitorRecord>> {
        let records = sqlx::query_as::<_, VisitorRecord>(
            r#"
            SELECT visitor, visits, first_seen_at, last_seen_at
            FROM visitor_visits
            ORDER BY visits DESC, last_seen_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_sqlite() -> SqliteStorage {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_first_increment_starts_at_one() {
        let storage = setup_sqlite().await;
        assert_eq!(storage.get("fresh").await.unwrap(), None);
        assert_eq!(storage.get_and_increment("fresh").await.unwrap(), 1);
        assert_eq!(storage.get_and_increment("fresh").await.unwrap(), 2);
        assert_eq!(storage.get("fresh").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let storage = setup_sqlite().await;
        storage.get_and_increment("a").await.unwrap();
        storage.get_and_increment("a").await.unwrap();
        assert_eq!(storage.get_and_increment("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_and_top() {
        let storage = setup_sqlite().await;
        for _ in 0..3 {
            storage.get_and_increment("busy").await.unwrap();
        }
        storage.get_and_increment("quiet").await.unwrap();

        let top = storage.top(10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].visitor, "busy");
        assert_eq!(top[0].visits, 3);

        assert!(storage.reset("busy").await.unwrap());
        assert!(!storage.reset("busy").await.unwrap());
        assert_eq!(storage.get_and_increment("busy").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let storage = setup_sqlite().await;
        storage.get_and_increment("kept").await.unwrap();
        storage.init().await.unwrap();
        assert_eq!(storage.get("kept").await.unwrap(), Some(1));
    }
}
