//! Test utilities for the helpdesk
//!
//! Shared fixtures that wire the components over in-memory storage and a
//! manual clock, plus a storage wrapper that injects failures.

#![cfg(test)]

use crate::access::LogMailer;
use crate::clock::ManualClock;
use crate::config::Config;
use crate::core::{
    Attachment, AttachmentId, NewTicket, Principal, ReadMark, Reply, ReplyId, Status, Ticket,
    TicketId, Urgency, UserId,
};
use crate::error::{HelpdeskError, Result};
use crate::service::Helpdesk;
use crate::storage::{
    AttachmentRepository, MemoryStorage, ReadMarkRepository, ReplyRepository, TicketFilter,
    TicketRepository, UnreadQuery,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Fully wired helpdesk over in-memory storage
pub struct TestDesk {
    pub storage: MemoryStorage,
    pub clock: ManualClock,
    pub helpdesk: Helpdesk,
    pub admin: Principal,
}

impl TestDesk {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(Utc::now());
        let helpdesk = Helpdesk::new(
            Arc::new(storage.clone()),
            Arc::new(clock.clone()),
            Arc::new(LogMailer),
            config,
        )
        .expect("Failed to build helpdesk");

        Self {
            storage,
            clock,
            helpdesk,
            admin: Principal::admin(),
        }
    }

    /// File a ticket as `customer` and return it
    pub async fn open_ticket(&self, customer: &Principal, title: &str) -> Ticket {
        self.helpdesk
            .desk
            .open_ticket(customer, new_ticket(title))
            .await
            .expect("Failed to open ticket")
            .ticket
    }

    /// Post a reply without attachments
    pub async fn reply(&self, ticket: &Ticket, author: &Principal, message: &str) -> Reply {
        self.helpdesk
            .replies
            .add_reply(&ticket.id, author, message, Vec::new())
            .await
            .expect("Failed to add reply")
            .reply
    }

    pub async fn status_of(&self, ticket: &Ticket) -> Status {
        self.storage
            .load_ticket(&ticket.id)
            .await
            .expect("Failed to load ticket")
            .status
    }
}

/// Create a ticket request with default values
pub fn new_ticket(title: &str) -> NewTicket {
    NewTicket {
        title: title.to_string(),
        description: format!("Description for {title}"),
        urgency: Urgency::Normal,
        product: "ERP".to_string(),
        attachments: Vec::new(),
    }
}

/// Storage wrapper that fails selected operations or interleaves a
/// concurrent writer
///
/// Everything else is delegated to the wrapped [`MemoryStorage`].
#[derive(Clone)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    failing_status_updates: HashSet<TicketId>,
    close_after_load: Arc<Mutex<HashSet<TicketId>>>,
    reopen_after_listing: Arc<Mutex<HashSet<TicketId>>>,
}

impl FlakyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            failing_status_updates: HashSet::new(),
            close_after_load: Arc::default(),
            reopen_after_listing: Arc::default(),
        }
    }

    /// Make status writes fail for one ticket
    pub fn fail_status_updates_for(mut self, id: TicketId) -> Self {
        self.failing_status_updates.insert(id);
        self
    }

    /// Close the ticket once, right after the next `load_ticket` for it
    pub fn close_after_load(self, id: TicketId) -> Self {
        self.close_after_load
            .lock()
            .expect("Lock poisoned")
            .insert(id);
        self
    }

    /// Move the ticket to 진행중 once, right after the next `list_tickets`
    pub fn reopen_after_listing(self, id: TicketId) -> Self {
        self.reopen_after_listing
            .lock()
            .expect("Lock poisoned")
            .insert(id);
        self
    }

    fn take(hooks: &Mutex<HashSet<TicketId>>, id: &TicketId) -> bool {
        hooks.lock().expect("Lock poisoned").remove(id)
    }
}

#[async_trait]
impl TicketRepository for FlakyStorage {
    async fn insert_ticket_with_attachments(
        &self,
        ticket: &Ticket,
        attachments: &[Attachment],
    ) -> Result<()> {
        self.inner
            .insert_ticket_with_attachments(ticket, attachments)
            .await
    }

    async fn load_ticket(&self, id: &TicketId) -> Result<Ticket> {
        let ticket = self.inner.load_ticket(id).await?;
        if Self::take(&self.close_after_load, id) {
            self.inner
                .update_status(id, Status::Closed, Utc::now())
                .await?;
        }
        Ok(ticket)
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        let tickets = self.inner.list_tickets(filter).await?;
        let reopened: Vec<TicketId> = tickets
            .iter()
            .map(|t| t.id)
            .filter(|id| Self::take(&self.reopen_after_listing, id))
            .collect();
        for id in reopened {
            self.inner
                .update_status(&id, Status::InProgress, Utc::now())
                .await?;
        }
        Ok(tickets)
    }

    async fn update_status(&self, id: &TicketId, status: Status, at: DateTime<Utc>) -> Result<()> {
        if self.failing_status_updates.contains(id) {
            return Err(HelpdeskError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.update_status(id, status, at).await
    }

    async fn close_stale_answered(
        &self,
        id: &TicketId,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        if self.failing_status_updates.contains(id) {
            return Err(HelpdeskError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.close_stale_answered(id, cutoff, at).await
    }

    async fn delete_ticket(&self, id: &TicketId) -> Result<()> {
        self.inner.delete_ticket(id).await
    }
}

#[async_trait]
impl ReplyRepository for FlakyStorage {
    async fn insert_reply_with_attachments(
        &self,
        reply: &Reply,
        attachments: &[Attachment],
    ) -> Result<()> {
        self.inner
            .insert_reply_with_attachments(reply, attachments)
            .await
    }

    async fn load_reply(&self, ticket_id: &TicketId, reply_id: &ReplyId) -> Result<Reply> {
        self.inner.load_reply(ticket_id, reply_id).await
    }

    async fn list_replies(&self, ticket_id: &TicketId) -> Result<Vec<Reply>> {
        self.inner.list_replies(ticket_id).await
    }

    async fn update_reply_message(
        &self,
        reply_id: &ReplyId,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.inner.update_reply_message(reply_id, message, at).await
    }

    async fn delete_reply(&self, reply_id: &ReplyId) -> Result<()> {
        self.inner.delete_reply(reply_id).await
    }
}

#[async_trait]
impl ReadMarkRepository for FlakyStorage {
    async fn upsert_read_mark(&self, mark: &ReadMark) -> Result<()> {
        self.inner.upsert_read_mark(mark).await
    }

    async fn load_read_mark(
        &self,
        ticket_id: &TicketId,
        user_id: &UserId,
    ) -> Result<Option<ReadMark>> {
        self.inner.load_read_mark(ticket_id, user_id).await
    }

    async fn unread_counts(&self, query: &UnreadQuery) -> Result<HashMap<TicketId, u64>> {
        self.inner.unread_counts(query).await
    }
}

#[async_trait]
impl AttachmentRepository for FlakyStorage {
    async fn load_attachment(&self, id: &AttachmentId) -> Result<Attachment> {
        self.inner.load_attachment(id).await
    }

    async fn list_ticket_attachments(&self, ticket_id: &TicketId) -> Result<Vec<Attachment>> {
        self.inner.list_ticket_attachments(ticket_id).await
    }

    async fn list_reply_attachments(&self, reply_id: &ReplyId) -> Result<Vec<Attachment>> {
        self.inner.list_reply_attachments(reply_id).await
    }

    async fn delete_attachment(&self, id: &AttachmentId) -> Result<()> {
        self.inner.delete_attachment(id).await
    }
}
