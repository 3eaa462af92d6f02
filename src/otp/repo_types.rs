use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

/// One-time code row, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OtpRecord {
    pub email: String,
    pub code: i32,
    pub created_at: OffsetDateTime,
}

impl OtpRecord {
    /// Expired once `now - created_at` reaches `ttl`; the boundary itself is expired.
    pub fn is_expired(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        now - self.created_at >= ttl
    }
}
