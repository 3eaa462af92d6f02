use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OtpConfig;
use crate::otp::{mailer::Mailer, repo::OtpStore, repo_types::OtpRecord};

pub const CODE_MIN: i32 = 100_000;
pub const CODE_MAX: i32 = 999_999;

const EMAIL_SUBJECT: &str = "OTP Verification";

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("otp storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Outcome of a check. Only `Valid` lets the caller through; the others
/// are kept apart for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Mismatch,
    Expired,
    NotFound,
}

impl Verification {
    pub fn is_valid(self) -> bool {
        self == Verification::Valid
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub ttl: Duration,
    /// Delete the record after a successful check.
    pub single_use: bool,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(5),
            single_use: false,
        }
    }
}

impl From<&OtpConfig> for OtpPolicy {
    fn from(cfg: &OtpConfig) -> Self {
        Self {
            ttl: Duration::seconds(cfg.ttl_seconds),
            single_use: cfg.single_use,
        }
    }
}

pub fn generate_code() -> i32 {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX)
}

fn email_body(code: i32) -> String {
    format!("Your OTP is: {}", code)
}

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    mailer: Arc<dyn Mailer>,
    policy: OtpPolicy,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, mailer: Arc<dyn Mailer>, policy: OtpPolicy) -> Self {
        Self {
            store,
            mailer,
            policy,
        }
    }

    /// Issue a fresh code for `email`, superseding any previous one, and
    /// start delivering it in the background.
    pub async fn issue(&self, email: &str) -> Result<i32, OtpError> {
        let (code, _delivery) = self
            .issue_with_delivery(email, OffsetDateTime::now_utc())
            .await?;
        Ok(code)
    }

    /// Like [`issue`](Self::issue) but hands back the delivery task.
    /// The code is persisted before delivery starts, so a failed send
    /// still leaves a usable record.
    pub async fn issue_with_delivery(
        &self,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<(i32, JoinHandle<()>), OtpError> {
        let record = OtpRecord {
            email: email.to_string(),
            code: generate_code(),
            created_at: now,
        };
        self.store.replace(&record).await?;
        debug!(%email, "otp stored");

        let delivery = self.dispatch(email, record.code);
        Ok((record.code, delivery))
    }

    fn dispatch(&self, email: &str, code: i32) -> JoinHandle<()> {
        let mailer = Arc::clone(&self.mailer);
        let to = email.to_string();
        tokio::spawn(async move {
            match mailer.send(&to, EMAIL_SUBJECT, &email_body(code)).await {
                Ok(()) => info!(email = %to, "otp email sent"),
                Err(e) => warn!(error = %e, email = %to, "otp email delivery failed"),
            }
        })
    }

    pub async fn verify(&self, email: &str, submitted: i32) -> Result<Verification, OtpError> {
        self.verify_at(email, submitted, OffsetDateTime::now_utc())
            .await
    }

    pub async fn verify_at(
        &self,
        email: &str,
        submitted: i32,
        now: OffsetDateTime,
    ) -> Result<Verification, OtpError> {
        let Some(record) = self.store.find(email).await? else {
            return Ok(Verification::NotFound);
        };

        if record.code != submitted {
            return Ok(Verification::Mismatch);
        }
        if record.is_expired(now, self.policy.ttl) {
            // Leaves a code re-issued since the lookup in place.
            self.store.remove(email, record.code).await?;
            return Ok(Verification::Expired);
        }

        // A concurrent check or a newer issue may have replaced the row.
        if self.policy.single_use && !self.store.remove(email, record.code).await? {
            return Ok(Verification::NotFound);
        }

        Ok(Verification::Valid)
    }
}
