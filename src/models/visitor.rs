use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VisitorRecord {
    pub visitor: String,
    pub visits: i64,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
}
