//! Wiring of the helpdesk components
//!
//! [`Helpdesk`] bundles the desk, reply thread, lifecycle engine and
//! verification codes over one shared store and clock.

use crate::access::{LogMailer, Mailer, VerificationCodes};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::{LifecycleEngine, SlaPolicy};
use crate::replies::ReplyThread;
use crate::storage::{Repository, SqliteStorage};
use crate::tickets::TicketDesk;
use std::sync::Arc;

#[derive(Clone)]
pub struct Helpdesk {
    pub desk: TicketDesk,
    pub replies: ReplyThread,
    pub lifecycle: LifecycleEngine,
    pub codes: VerificationCodes,
}

impl Helpdesk {
    /// # Errors
    ///
    /// `Validation` when the SLA window or code lifetime is unusable.
    pub fn new(
        store: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
        config: &Config,
    ) -> Result<Self> {
        let policy: SlaPolicy = config.sla.policy()?;
        let code_ttl = config.verification.code_ttl()?;

        let desk = TicketDesk::new(store.clone(), clock.clone());
        let replies = desk.replies().clone();
        let lifecycle = LifecycleEngine::new(store, clock.clone(), policy);
        let codes = VerificationCodes::new(code_ttl, clock, mailer);

        Ok(Self {
            desk,
            replies,
            lifecycle,
            codes,
        })
    }

    /// Open the configured database, apply migrations and wire everything
    /// against the system clock and the logging mailer
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let storage = open_storage(config).await?;
        Self::new(
            Arc::new(storage),
            Arc::new(SystemClock),
            Arc::new(LogMailer),
            config,
        )
    }
}

/// Connect to the configured SQLite database and bring its schema up to date
pub async fn open_storage(config: &Config) -> Result<SqliteStorage> {
    let storage =
        SqliteStorage::connect(&config.database.url, config.database.max_connections).await?;
    storage.migrate().await?;
    Ok(storage)
}
