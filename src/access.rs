//! Email verification codes
//!
//! Short numeric codes keyed by email address with a fixed time-to-live.
//! Delivery goes through the [`Mailer`] collaborator; this module only keeps
//! the pending codes.

use crate::clock::Clock;
use crate::error::{HelpdeskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const CODE_DIGITS: u32 = 6;
/// Wrong guesses allowed before a pending code is discarded
const MAX_ATTEMPTS: u32 = 5;

/// Outbound mail collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(&self, email: &str, code: &str) -> Result<()>;
}

/// Mailer that only records deliveries in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(&self, email: &str, _code: &str) -> Result<()> {
        info!("Verification code issued for {email}");
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

/// Keyed store of pending verification codes with TTL eviction
#[derive(Clone)]
pub struct VerificationCodes {
    pending: Arc<Mutex<HashMap<String, PendingCode>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    mailer: Arc<dyn Mailer>,
}

impl VerificationCodes {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            clock,
            mailer,
        }
    }

    /// Generate a code for `email`, replacing any earlier one, and mail it
    pub async fn issue(&self, email: &str) -> Result<DateTime<Utc>> {
        let key = normalize(email)?;
        let code = generate_code();
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| HelpdeskError::Validation("code lifetime is out of range".to_string()))?;

        self.mailer.send_verification_code(&key, &code).await?;
        self.pending.lock().await.insert(
            key,
            PendingCode {
                code,
                expires_at,
                failed_attempts: 0,
            },
        );
        Ok(expires_at)
    }

    /// Check a code; a match consumes it
    ///
    /// After [`MAX_ATTEMPTS`] wrong guesses the pending code is dropped and a
    /// new one has to be issued.
    pub async fn verify(&self, email: &str, code: &str) -> Result<bool> {
        let key = normalize(email)?;
        let now = self.clock.now();
        let mut pending = self.pending.lock().await;

        let Some(entry) = pending.get_mut(&key) else {
            return Ok(false);
        };
        if entry.expires_at <= now {
            pending.remove(&key);
            return Ok(false);
        }
        if entry.code != code.trim() {
            entry.failed_attempts += 1;
            if entry.failed_attempts >= MAX_ATTEMPTS {
                pending.remove(&key);
                info!("Discarded verification code for {key} after {MAX_ATTEMPTS} wrong attempts");
            }
            return Ok(false);
        }

        pending.remove(&key);
        Ok(true)
    }

    /// Drop every expired code, returning how many were removed
    pub async fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|_, entry| entry.expires_at > now);
        let evicted = before - pending.len();
        if evicted > 0 {
            debug!("Evicted {evicted} expired verification codes");
        }
        evicted
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

fn normalize(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(HelpdeskError::Validation(format!("invalid email address: {email}"))),
    }
}

fn generate_code() -> String {
    let modulus = 10u128.pow(CODE_DIGITS);
    let value = Uuid::new_v4().as_u128() % modulus;
    format!("{value:0width$}", width = CODE_DIGITS as usize)
}
