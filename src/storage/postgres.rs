use crate::models::VisitorRecord;
use crate::storage::{CounterResult, VisitCounter};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl VisitCounter for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitor_visits (
                visitor TEXT PRIMARY KEY,
                visits BIGINT NOT NULL DEFAULT 0,
                first_seen_at BIGINT NOT NULL,
                last_seen_at BIGINT NOT NULL
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

        // Row lock taken by ON CONFLICT serialises concurrent increments of one key
        let visits = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO visitor_visits (visitor, visits, first_seen_at, last_seen_at)
            VALUES ($1, 1, $2, $2)
            ON CONFLICT (visitor) DO UPDATE SET
                visits = visitor_visits.visits + 1,
                last_seen_at = EXCLUDED.last_seen_at
            RETURNING visits
            "#,
        )
        .bind(visitor)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(visits)
    }

    async fn get(&self, visitor: &str) -> CounterResult<Option<i64>> {
        let visits = sqlx::query_scalar::<_, i64>(
            "SELECT visits FROM visitor_visits WHERE visitor = $1",
        )
        .bind(visitor)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(visits)
    }

    async fn reset(&self, visitor: &str) -> CounterResult<bool> {
        let result = sqlx::query("DELETE FROM visitor_visits WHERE visitor = $1")
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
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(records)
    }
}
