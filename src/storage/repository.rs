use crate::core::{
    Attachment, AttachmentId, ReadMark, Reply, ReplyId, Role, Status, Ticket, TicketId, Urgency,
    UserId,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Criteria for listing tickets
///
/// All fields are optional; an empty filter matches every ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub customer_id: Option<UserId>,
    pub status: Option<Status>,
    pub urgency: Option<Urgency>,
}

impl TicketFilter {
    /// Filter restricted to one customer's tickets
    #[must_use]
    pub fn for_customer(customer_id: UserId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.customer_id.is_none_or(|c| ticket.customer_id == c)
            && self.status.is_none_or(|s| ticket.status == s)
            && self.urgency.is_none_or(|u| ticket.urgency == u)
    }
}

/// Parameters of an unread-count computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreadQuery {
    /// User whose read-marks are consulted
    pub viewer: UserId,
    /// Only replies snapshotted with this role count as unread
    pub author_role: Role,
    /// Restrict to one customer's tickets; `None` covers every ticket
    pub customer_id: Option<UserId>,
}

/// Repository trait for ticket rows
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.insert_ticket_with_attachments(ticket, &[]).await
    }

    /// Inserts a ticket and its files as one unit; nothing is kept on failure
    async fn insert_ticket_with_attachments(
        &self,
        ticket: &Ticket,
        attachments: &[Attachment],
    ) -> Result<()>;

    /// Loads a ticket by ID, failing with `NotFound` when absent
    async fn load_ticket(&self, id: &TicketId) -> Result<Ticket>;

    /// Lists tickets matching the filter, newest first
    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>>;

    /// Changes the status of a ticket that is not closed
    ///
    /// The closed check and the write happen in one step: a ticket closed by
    /// a concurrent writer fails with `TerminalState` instead of reopening.
    async fn update_status(&self, id: &TicketId, status: Status, at: DateTime<Utc>) -> Result<()>;

    /// Closes a ticket if it is still answered and its latest reply is an
    /// admin's, written before `cutoff`
    ///
    /// Evaluated atomically against the current rows. Returns whether the
    /// ticket was closed.
    async fn close_stale_answered(
        &self,
        id: &TicketId,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Deletes a ticket together with its replies, read-marks and attachments
    async fn delete_ticket(&self, id: &TicketId) -> Result<()>;
}

/// Repository trait for reply threads
#[async_trait]
pub trait ReplyRepository: Send + Sync {
    async fn insert_reply(&self, reply: &Reply) -> Result<()> {
        self.insert_reply_with_attachments(reply, &[]).await
    }

    /// Inserts a reply and its files as one unit; nothing is kept on failure
    async fn insert_reply_with_attachments(
        &self,
        reply: &Reply,
        attachments: &[Attachment],
    ) -> Result<()>;

    /// Loads a reply, failing with `NotFound` unless it belongs to `ticket_id`
    async fn load_reply(&self, ticket_id: &TicketId, reply_id: &ReplyId) -> Result<Reply>;

    /// Lists a ticket's replies, oldest first
    async fn list_replies(&self, ticket_id: &TicketId) -> Result<Vec<Reply>>;

    async fn update_reply_message(
        &self,
        reply_id: &ReplyId,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn delete_reply(&self, reply_id: &ReplyId) -> Result<()>;
}

/// Repository trait for read-marks
#[async_trait]
pub trait ReadMarkRepository: Send + Sync {
    /// Inserts or refreshes a read-mark in one atomic step
    ///
    /// The stored timestamp never moves backwards.
    async fn upsert_read_mark(&self, mark: &ReadMark) -> Result<()>;

    async fn load_read_mark(&self, ticket_id: &TicketId, user_id: &UserId)
    -> Result<Option<ReadMark>>;

    /// Unread reply counts for every ticket in scope, zero counts included
    async fn unread_counts(&self, query: &UnreadQuery) -> Result<HashMap<TicketId, u64>>;
}

/// Repository trait for attachment metadata
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn load_attachment(&self, id: &AttachmentId) -> Result<Attachment>;

    /// Attachments filed directly on the ticket (not through a reply)
    async fn list_ticket_attachments(&self, ticket_id: &TicketId) -> Result<Vec<Attachment>>;

    async fn list_reply_attachments(&self, reply_id: &ReplyId) -> Result<Vec<Attachment>>;

    async fn delete_attachment(&self, id: &AttachmentId) -> Result<()>;
}

/// Combined repository trait
pub trait Repository:
    TicketRepository + ReplyRepository + ReadMarkRepository + AttachmentRepository
{
}

/// Implementation of Repository for types that implement all four traits
impl<T> Repository for T where
    T: TicketRepository + ReplyRepository + ReadMarkRepository + AttachmentRepository
{
}
