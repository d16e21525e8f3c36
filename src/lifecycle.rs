//! Ticket lifecycle engine
//!
//! Owns the status state machine, per-viewer unread counts, read tracking and
//! the SLA auto-close sweep.
//!
//! Status changes are admin overrides: an admin may move a ticket to any of
//! the four states, forward or back, until it reaches 종결 (closed). Once a
//! ticket is closed nothing can reopen it.

use crate::clock::Clock;
use crate::core::{Principal, ReadMark, Role, Status, Ticket, TicketId};
use crate::error::{HelpdeskError, Result};
use crate::storage::{ReadMarkRepository, Repository, TicketFilter, TicketRepository, UnreadQuery};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How long an admin-answered ticket may sit without a customer response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaPolicy {
    pub auto_close_after: Duration,
}

impl SlaPolicy {
    pub const DEFAULT_DAYS: i64 = 7;

    #[must_use]
    pub const fn new(auto_close_after: Duration) -> Self {
        Self { auto_close_after }
    }

    /// A window of whole days
    ///
    /// # Errors
    ///
    /// `Validation` for negative windows and for values chrono cannot
    /// represent.
    pub fn days(days: i64) -> Result<Self> {
        if days < 0 {
            return Err(HelpdeskError::Validation(format!(
                "auto-close window must not be negative: {days} days"
            )));
        }
        Duration::try_days(days).map(Self::new).ok_or_else(|| {
            HelpdeskError::Validation(format!(
                "auto-close window of {days} days is out of range"
            ))
        })
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::new(Duration::days(Self::DEFAULT_DAYS))
    }
}

/// Outcome of one auto-close sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Tickets in 답변 완료 that were examined
    pub scanned: usize,
    pub closed: usize,
    /// Tickets whose closure failed; the sweep carried on without them
    pub failed: usize,
}

/// Applies status transitions and computes read state
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    policy: SlaPolicy,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn Repository>, clock: Arc<dyn Clock>, policy: SlaPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> SlaPolicy {
        self.policy
    }

    /// Move a ticket to `new_status`
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-admin actors, `NotFound` for unknown tickets and
    /// `TerminalState` when the ticket is already closed, including when it
    /// was closed after it was loaded here.
    pub async fn set_status(
        &self,
        ticket_id: &TicketId,
        new_status: Status,
        actor: &Principal,
    ) -> Result<Ticket> {
        if !actor.is_admin() {
            return Err(HelpdeskError::Forbidden(
                "only administrators can change ticket status".to_string(),
            ));
        }

        let mut ticket = self.store.load_ticket(ticket_id).await?;
        if ticket.status.is_terminal() {
            return Err(HelpdeskError::TerminalState {
                id: ticket_id.to_string(),
            });
        }

        if !ticket.status.is_forward_to(new_status) {
            debug!(
                "Admin {} overriding ticket {ticket_id} from {} back to {new_status}",
                actor.id, ticket.status
            );
        }

        let now = self.clock.now();
        self.store.update_status(ticket_id, new_status, now).await?;
        info!("Ticket {ticket_id} moved {} -> {new_status}", ticket.status);

        ticket.status = new_status;
        ticket.updated_at = now;
        Ok(ticket)
    }

    /// Count replies the viewer has not seen, per visible ticket
    ///
    /// Admins see every ticket and are waiting on customer replies; customers
    /// see their own tickets and are waiting on admin replies. Every visible
    /// ticket appears in the result, zero counts included.
    pub async fn compute_unread_counts(
        &self,
        viewer: &Principal,
    ) -> Result<HashMap<TicketId, u64>> {
        let query = UnreadQuery {
            viewer: viewer.id,
            author_role: viewer.role.opposite(),
            customer_id: match viewer.role {
                Role::Admin => None,
                Role::Customer => Some(viewer.id),
            },
        };
        self.store.unread_counts(&query).await
    }

    /// Record that `viewer` has seen the ticket as of now
    ///
    /// Idempotent; concurrent calls converge on the latest timestamp.
    pub async fn mark_read(&self, ticket_id: &TicketId, viewer: &Principal) -> Result<ReadMark> {
        let ticket = self.store.load_ticket(ticket_id).await?;
        ensure_visible(&ticket, viewer)?;

        let mark = ReadMark {
            ticket_id: *ticket_id,
            user_id: viewer.id,
            last_read_at: self.clock.now(),
        };
        self.store.upsert_read_mark(&mark).await?;
        Ok(mark)
    }

    /// Close answered tickets whose last word came from an admin long ago
    ///
    /// A ticket in 답변 완료 closes when its most recent reply was written by
    /// an admin more than the SLA window ago. Tickets without replies, or
    /// whose latest reply is the customer's, stay open. A failure on one
    /// ticket is logged and counted; the sweep continues with the rest.
    pub async fn auto_close_stale_pending(&self) -> Result<SweepReport> {
        let pending = self
            .store
            .list_tickets(&TicketFilter::with_status(Status::Answered))
            .await?;
        let now = self.clock.now();
        let mut report = SweepReport {
            scanned: pending.len(),
            ..SweepReport::default()
        };

        for ticket in &pending {
            match self.close_if_stale(ticket, now).await {
                Ok(true) => report.closed += 1,
                Ok(false) => {},
                Err(e) => {
                    warn!("Auto-close skipped ticket {}: {e}", ticket.id);
                    report.failed += 1;
                },
            }
        }

        info!(
            "Auto-close sweep finished: {} scanned, {} closed, {} failed",
            report.scanned, report.closed, report.failed
        );
        Ok(report)
    }

    /// The listing may be stale by now, so the storage re-checks status and
    /// latest reply in the same write
    async fn close_if_stale(&self, ticket: &Ticket, now: DateTime<Utc>) -> Result<bool> {
        let Some(cutoff) = now.checked_sub_signed(self.policy.auto_close_after) else {
            return Ok(false);
        };

        let closed = self
            .store
            .close_stale_answered(&ticket.id, cutoff, now)
            .await?;
        if closed {
            info!(
                "Auto-closed ticket {} (last admin reply before {cutoff})",
                ticket.id
            );
        } else {
            debug!("Ticket {} no longer eligible for auto-close", ticket.id);
        }
        Ok(closed)
    }
}

/// Customers may only touch their own tickets; admins see everything
pub(crate) fn ensure_visible(ticket: &Ticket, viewer: &Principal) -> Result<()> {
    if viewer.is_admin() || ticket.is_owned_by(&viewer.id) {
        Ok(())
    } else {
        Err(HelpdeskError::Forbidden(format!(
            "ticket {} belongs to another customer",
            ticket.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::core::{ReplyBuilder, TicketBuilder, UserId};
    use crate::storage::{MemoryStorage, ReplyRepository};
    use crate::test_utils::FlakyStorage;

    struct Fixture {
        storage: MemoryStorage,
        clock: ManualClock,
        engine: LifecycleEngine,
    }

    fn fixture() -> Fixture {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(Utc::now());
        let engine = LifecycleEngine::new(
            Arc::new(storage.clone()),
            Arc::new(clock.clone()),
            SlaPolicy::default(),
        );
        Fixture {
            storage,
            clock,
            engine,
        }
    }

    async fn ticket_in(storage: &MemoryStorage, status: Status, customer: UserId) -> Ticket {
        let ticket = TicketBuilder::new()
            .title("Laptop will not boot")
            .customer(customer)
            .status(status)
            .build();
        storage.insert_ticket(&ticket).await.unwrap();
        ticket
    }

    async fn reply(
        storage: &MemoryStorage,
        ticket: &Ticket,
        role: Role,
        author: UserId,
        at: DateTime<Utc>,
    ) {
        let reply = ReplyBuilder::new(ticket.id, author, role)
            .message("reply")
            .created_at(at)
            .build();
        storage.insert_reply(&reply).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_status_persists() {
        let f = fixture();
        let ticket = ticket_in(&f.storage, Status::Received, UserId::new()).await;
        let admin = Principal::admin();

        let updated = f
            .engine
            .set_status(&ticket.id, Status::InProgress, &admin)
            .await
            .unwrap();
        assert_eq!(updated.status, Status::InProgress);
        assert_eq!(updated.updated_at, f.clock.now());

        let stored = f.storage.load_ticket(&ticket.id).await.unwrap();
        assert_eq!(stored.status, Status::InProgress);
    }

    #[tokio::test]
    async fn test_admin_can_move_backwards() {
        let f = fixture();
        let ticket = ticket_in(&f.storage, Status::Answered, UserId::new()).await;

        let updated = f
            .engine
            .set_status(&ticket.id, Status::InProgress, &Principal::admin())
            .await
            .unwrap();
        assert_eq!(updated.status, Status::InProgress);
    }

    #[tokio::test]
    async fn test_closed_ticket_rejects_every_status() {
        let f = fixture();
        let ticket = ticket_in(&f.storage, Status::Closed, UserId::new()).await;
        let admin = Principal::admin();

        for status in Status::ALL {
            let err = f
                .engine
                .set_status(&ticket.id, status, &admin)
                .await
                .unwrap_err();
            assert!(matches!(err, HelpdeskError::TerminalState { .. }));
        }
    }

    #[tokio::test]
    async fn test_customer_cannot_set_status() {
        let f = fixture();
        let customer = Principal::customer();
        let ticket = ticket_in(&f.storage, Status::Received, customer.id).await;

        let err = f
            .engine
            .set_status(&ticket.id, Status::Closed, &customer)
            .await
            .unwrap_err();
        assert!(matches!(err, HelpdeskError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_set_status_unknown_ticket() {
        let f = fixture();
        let err = f
            .engine
            .set_status(&TicketId::new(), Status::Answered, &Principal::admin())
            .await
            .unwrap_err();
        assert!(matches!(err, HelpdeskError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unread_without_read_mark_counts_all_opposite_replies() {
        let f = fixture();
        let customer = Principal::customer();
        let ticket = ticket_in(&f.storage, Status::InProgress, customer.id).await;
        let now = f.clock.now();

        for i in 0..3 {
            reply(&f.storage, &ticket, Role::Admin, UserId::new(), now + Duration::seconds(i)).await;
        }
        reply(&f.storage, &ticket, Role::Customer, customer.id, now).await;

        let counts = f.engine.compute_unread_counts(&customer).await.unwrap();
        assert_eq!(counts[&ticket.id], 3);
    }

    #[tokio::test]
    async fn test_unread_only_counts_replies_after_mark() {
        let f = fixture();
        let customer = Principal::customer();
        let ticket = ticket_in(&f.storage, Status::InProgress, customer.id).await;

        reply(&f.storage, &ticket, Role::Admin, UserId::new(), f.clock.now()).await;
        f.clock.advance(Duration::minutes(1));
        f.engine.mark_read(&ticket.id, &customer).await.unwrap();

        f.clock.advance(Duration::minutes(1));
        reply(&f.storage, &ticket, Role::Admin, UserId::new(), f.clock.now()).await;

        let counts = f.engine.compute_unread_counts(&customer).await.unwrap();
        assert_eq!(counts[&ticket.id], 1);
    }

    #[tokio::test]
    async fn test_admin_sees_customer_replies_across_all_tickets() {
        let f = fixture();
        let admin = Principal::admin();
        let alice = UserId::new();
        let bob = UserId::new();
        let first = ticket_in(&f.storage, Status::Received, alice).await;
        let second = ticket_in(&f.storage, Status::Received, bob).await;

        reply(&f.storage, &first, Role::Customer, alice, f.clock.now()).await;
        reply(&f.storage, &first, Role::Admin, admin.id, f.clock.now()).await;

        let counts = f.engine.compute_unread_counts(&admin).await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&first.id], 1);
        assert_eq!(counts[&second.id], 0);
    }

    #[tokio::test]
    async fn test_customer_scope_excludes_foreign_tickets() {
        let f = fixture();
        let customer = Principal::customer();
        let own = ticket_in(&f.storage, Status::Received, customer.id).await;
        let foreign = ticket_in(&f.storage, Status::Received, UserId::new()).await;
        reply(&f.storage, &foreign, Role::Admin, UserId::new(), f.clock.now()).await;

        let counts = f.engine.compute_unread_counts(&customer).await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&own.id], 0);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let f = fixture();
        let customer = Principal::customer();
        let ticket = ticket_in(&f.storage, Status::Received, customer.id).await;

        let first = f.engine.mark_read(&ticket.id, &customer).await.unwrap();
        let second = f.engine.mark_read(&ticket.id, &customer).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_mark_read_foreign_ticket_forbidden() {
        let f = fixture();
        let ticket = ticket_in(&f.storage, Status::Received, UserId::new()).await;

        let err = f
            .engine
            .mark_read(&ticket.id, &Principal::customer())
            .await
            .unwrap_err();
        assert!(matches!(err, HelpdeskError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_auto_close_after_sla_window() {
        let f = fixture();
        let ticket = ticket_in(&f.storage, Status::Answered, UserId::new()).await;
        reply(&f.storage, &ticket, Role::Admin, UserId::new(), f.clock.now()).await;

        f.clock.advance(Duration::days(7));
        let report = f.engine.auto_close_stale_pending().await.unwrap();
        assert_eq!(report.closed, 0, "exactly seven days is not stale yet");

        f.clock.advance(Duration::seconds(1));
        let report = f.engine.auto_close_stale_pending().await.unwrap();
        assert_eq!(report.closed, 1);
        assert_eq!(
            f.storage.load_ticket(&ticket.id).await.unwrap().status,
            Status::Closed
        );
    }

    #[tokio::test]
    async fn test_auto_close_skips_customer_last_word() {
        let f = fixture();
        let customer = UserId::new();
        let ticket = ticket_in(&f.storage, Status::Answered, customer).await;
        let start = f.clock.now();
        reply(&f.storage, &ticket, Role::Admin, UserId::new(), start).await;
        reply(&f.storage, &ticket, Role::Customer, customer, start + Duration::hours(1)).await;

        f.clock.advance(Duration::days(30));
        let report = f.engine.auto_close_stale_pending().await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.closed, 0);
    }

    #[tokio::test]
    async fn test_auto_close_skips_tickets_without_replies() {
        let f = fixture();
        ticket_in(&f.storage, Status::Answered, UserId::new()).await;

        f.clock.advance(Duration::days(90));
        let report = f.engine.auto_close_stale_pending().await.unwrap();
        assert_eq!(report.closed, 0);
    }

    #[tokio::test]
    async fn test_auto_close_ignores_other_statuses() {
        let f = fixture();
        let ticket = ticket_in(&f.storage, Status::InProgress, UserId::new()).await;
        reply(&f.storage, &ticket, Role::Admin, UserId::new(), f.clock.now()).await;

        f.clock.advance(Duration::days(30));
        let report = f.engine.auto_close_stale_pending().await.unwrap();
        assert_eq!(report.scanned, 0);
        assert_eq!(
            f.storage.load_ticket(&ticket.id).await.unwrap().status,
            Status::InProgress
        );
    }

    #[tokio::test]
    async fn test_auto_close_continues_after_failure() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(Utc::now());
        let broken = ticket_in(&storage, Status::Answered, UserId::new()).await;
        let healthy = ticket_in(&storage, Status::Answered, UserId::new()).await;
        for ticket in [&broken, &healthy] {
            reply(&storage, ticket, Role::Admin, UserId::new(), clock.now()).await;
        }

        let flaky = FlakyStorage::new(storage.clone()).fail_status_updates_for(broken.id);
        let engine = LifecycleEngine::new(
            Arc::new(flaky),
            Arc::new(clock.clone()),
            SlaPolicy::default(),
        );

        clock.advance(Duration::days(8));
        let report = engine.auto_close_stale_pending().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.closed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(
            storage.load_ticket(&healthy.id).await.unwrap().status,
            Status::Closed
        );
        assert_eq!(
            storage.load_ticket(&broken.id).await.unwrap().status,
            Status::Answered
        );
    }

    #[tokio::test]
    async fn test_custom_sla_window() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(Utc::now());
        let engine = LifecycleEngine::new(
            Arc::new(storage.clone()),
            Arc::new(clock.clone()),
            SlaPolicy::days(2).unwrap(),
        );
        let ticket = ticket_in(&storage, Status::Answered, UserId::new()).await;
        reply(&storage, &ticket, Role::Admin, UserId::new(), clock.now()).await;

        clock.advance(Duration::days(3));
        assert_eq!(engine.auto_close_stale_pending().await.unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_set_status_loses_to_concurrent_close() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(Utc::now());
        let ticket = ticket_in(&storage, Status::Received, UserId::new()).await;
        let racing = FlakyStorage::new(storage.clone()).close_after_load(ticket.id);
        let engine = LifecycleEngine::new(
            Arc::new(racing),
            Arc::new(clock.clone()),
            SlaPolicy::default(),
        );

        let err = engine
            .set_status(&ticket.id, Status::InProgress, &Principal::admin())
            .await
            .unwrap_err();
        assert!(matches!(err, HelpdeskError::TerminalState { .. }));
        assert_eq!(
            storage.load_ticket(&ticket.id).await.unwrap().status,
            Status::Closed
        );
    }

    #[tokio::test]
    async fn test_auto_close_skips_ticket_reopened_mid_sweep() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(Utc::now());
        let ticket = ticket_in(&storage, Status::Answered, UserId::new()).await;
        reply(&storage, &ticket, Role::Admin, UserId::new(), clock.now()).await;
        let racing = FlakyStorage::new(storage.clone()).reopen_after_listing(ticket.id);
        let engine = LifecycleEngine::new(
            Arc::new(racing),
            Arc::new(clock.clone()),
            SlaPolicy::default(),
        );

        clock.advance(Duration::days(8));
        let report = engine.auto_close_stale_pending().await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.closed, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(
            storage.load_ticket(&ticket.id).await.unwrap().status,
            Status::InProgress
        );
    }

    #[test]
    fn test_sla_policy_rejects_bad_windows() {
        assert_eq!(
            SlaPolicy::days(3).unwrap().auto_close_after,
            Duration::days(3)
        );
        assert!(SlaPolicy::days(0).is_ok());

        let negative = SlaPolicy::days(-1).unwrap_err();
        assert!(negative.to_string().contains("must not be negative"));

        let huge = SlaPolicy::days(200_000_000_000).unwrap_err();
        assert!(matches!(huge, HelpdeskError::Validation(_)));
        assert!(huge.to_string().contains("out of range"));
    }
}
