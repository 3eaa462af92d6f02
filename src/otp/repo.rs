use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::otp::repo_types::OtpRecord;

/// Persistence for one-time codes. Implementations must make `replace`
/// atomic per email: after it returns, no earlier code for that email
/// can be found.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Insert the record, superseding whatever the email had before.
    async fn replace(&self, record: &OtpRecord) -> anyhow::Result<()>;

    async fn find(&self, email: &str) -> anyhow::Result<Option<OtpRecord>>;

    /// Delete the email's record only if it still holds `code`.
    /// Returns whether a row was removed.
    async fn remove(&self, email: &str, code: i32) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgOtpStore {
    db: PgPool,
}

impl PgOtpStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn replace(&self, record: &OtpRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (email, code, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email)
            DO UPDATE SET code = EXCLUDED.code,
                          created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&record.email)
        .bind(record.code)
        .bind(record.created_at)
        .execute(&self.db)
        .await
        .context("upsert otp code")?;
        Ok(())
    }

    async fn find(&self, email: &str) -> anyhow::Result<Option<OtpRecord>> {
        let row = sqlx::query_as::<_, OtpRecord>(
            r#"
            SELECT email, code, created_at
              FROM otp_codes
             WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find otp code")?;
        Ok(row)
    }

    async fn remove(&self, email: &str, code: i32) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM otp_codes WHERE email = $1 AND code = $2"#)
            .bind(email)
            .bind(code)
            .execute(&self.db)
            .await
            .context("delete otp code")?;
        Ok(res.rows_affected() > 0)
    }
}

/// In-process store; a single map insert under the lock is the atomic replace.
#[derive(Default)]
pub struct MemoryOtpStore {
    records: Mutex<HashMap<String, OtpRecord>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, OtpRecord>>> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("otp store lock poisoned"))
    }

    /// Number of emails that currently hold a code.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn replace(&self, record: &OtpRecord) -> anyhow::Result<()> {
        self.lock()?.insert(record.email.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, email: &str) -> anyhow::Result<Option<OtpRecord>> {
        Ok(self.lock()?.get(email).cloned())
    }

    async fn remove(&self, email: &str, code: i32) -> anyhow::Result<bool> {
        let mut map = self.lock()?;
        match map.get(email) {
            Some(rec) if rec.code == code => {
                map.remove(email);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn rec(email: &str, code: i32) -> OtpRecord {
        OtpRecord {
            email: email.into(),
            code,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn replace_keeps_one_record_per_email() {
        let store = MemoryOtpStore::new();
        store.replace(&rec("a@x.com", 111_111)).await.unwrap();
        store.replace(&rec("a@x.com", 222_222)).await.unwrap();
        store.replace(&rec("b@x.com", 333_333)).await.unwrap();

        assert_eq!(store.len(), 2);
        let found = store.find("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.code, 222_222);
    }

    #[tokio::test]
    async fn find_unknown_email_is_none() {
        let store = MemoryOtpStore::new();
        assert!(store.find("nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_only_matches_current_code() {
        let store = MemoryOtpStore::new();
        store.replace(&rec("a@x.com", 111_111)).await.unwrap();

        assert!(!store.remove("a@x.com", 999_999).await.unwrap());
        assert_eq!(store.len(), 1);

        assert!(store.remove("a@x.com", 111_111).await.unwrap());
        assert!(store.is_empty());
        assert!(!store.remove("a@x.com", 111_111).await.unwrap());
    }
}
