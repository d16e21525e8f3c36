//! In-process storage backend
//!
//! Keeps every table in a single lock so multi-row operations such as ticket
//! deletion stay consistent. Used by tests, benchmarks and throwaway runs.

use super::repository::{
    AttachmentRepository, ReadMarkRepository, ReplyRepository, TicketFilter, TicketRepository,
    UnreadQuery,
};
use crate::core::{
    Attachment, AttachmentId, AttachmentOwner, ReadMark, Reply, ReplyId, Role, Status, Ticket,
    TicketId, UserId,
};
use crate::error::{HelpdeskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    tickets: HashMap<TicketId, Ticket>,
    replies: HashMap<ReplyId, Reply>,
    read_marks: HashMap<(TicketId, UserId), ReadMark>,
    attachments: HashMap<AttachmentId, Attachment>,
}

/// Storage backed by in-memory maps
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketRepository for MemoryStorage {
    async fn insert_ticket_with_attachments(
        &self,
        ticket: &Ticket,
        attachments: &[Attachment],
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.tickets.insert(ticket.id, ticket.clone());
        for attachment in attachments {
            tables.attachments.insert(attachment.id, attachment.clone());
        }
        Ok(())
    }

    async fn load_ticket(&self, id: &TicketId) -> Result<Ticket> {
        self.tables
            .read()
            .await
            .tickets
            .get(id)
            .cloned()
            .ok_or_else(|| HelpdeskError::ticket_not_found(id))
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        let tables = self.tables.read().await;
        let mut tickets: Vec<Ticket> = tables
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn update_status(&self, id: &TicketId, status: Status, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let ticket = tables
            .tickets
            .get_mut(id)
            .ok_or_else(|| HelpdeskError::ticket_not_found(id))?;
        if ticket.status.is_terminal() {
            return Err(HelpdeskError::TerminalState { id: id.to_string() });
        }
        ticket.status = status;
        ticket.updated_at = at;
        Ok(())
    }

    async fn close_stale_answered(
        &self,
        id: &TicketId,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let stale = tables
            .replies
            .values()
            .filter(|r| &r.ticket_id == id)
            .max_by_key(|r| r.created_at)
            .is_some_and(|last| last.role == Role::Admin && last.created_at < cutoff);

        let ticket = tables
            .tickets
            .get_mut(id)
            .ok_or_else(|| HelpdeskError::ticket_not_found(id))?;
        if !stale || ticket.status != Status::Answered {
            return Ok(false);
        }
        ticket.status = Status::Closed;
        ticket.updated_at = at;
        Ok(true)
    }

    async fn delete_ticket(&self, id: &TicketId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.tickets.remove(id).is_none() {
            return Err(HelpdeskError::ticket_not_found(id));
        }
        tables.replies.retain(|_, r| &r.ticket_id != id);
        tables.read_marks.retain(|(ticket_id, _), _| ticket_id != id);
        tables.attachments.retain(|_, a| &a.ticket_id != id);
        Ok(())
    }
}

#[async_trait]
impl ReplyRepository for MemoryStorage {
    async fn insert_reply_with_attachments(
        &self,
        reply: &Reply,
        attachments: &[Attachment],
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.replies.insert(reply.id, reply.clone());
        for attachment in attachments {
            tables.attachments.insert(attachment.id, attachment.clone());
        }
        Ok(())
    }

    async fn load_reply(&self, ticket_id: &TicketId, reply_id: &ReplyId) -> Result<Reply> {
        self.tables
            .read()
            .await
            .replies
            .get(reply_id)
            .filter(|r| &r.ticket_id == ticket_id)
            .cloned()
            .ok_or_else(|| HelpdeskError::reply_not_found(reply_id))
    }

    async fn list_replies(&self, ticket_id: &TicketId) -> Result<Vec<Reply>> {
        let tables = self.tables.read().await;
        let mut replies: Vec<Reply> = tables
            .replies
            .values()
            .filter(|r| &r.ticket_id == ticket_id)
            .cloned()
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(replies)
    }

    async fn update_reply_message(
        &self,
        reply_id: &ReplyId,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let reply = tables
            .replies
            .get_mut(reply_id)
            .ok_or_else(|| HelpdeskError::reply_not_found(reply_id))?;
        reply.message = message.to_string();
        reply.updated_at = at;
        Ok(())
    }

    async fn delete_reply(&self, reply_id: &ReplyId) -> Result<()> {
        self.tables
            .write()
            .await
            .replies
            .remove(reply_id)
            .map(|_| ())
            .ok_or_else(|| HelpdeskError::reply_not_found(reply_id))
    }
}

#[async_trait]
impl ReadMarkRepository for MemoryStorage {
    async fn upsert_read_mark(&self, mark: &ReadMark) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .read_marks
            .entry((mark.ticket_id, mark.user_id))
            .and_modify(|existing| {
                existing.last_read_at = existing.last_read_at.max(mark.last_read_at);
            })
            .or_insert(*mark);
        Ok(())
    }

    async fn load_read_mark(
        &self,
        ticket_id: &TicketId,
        user_id: &UserId,
    ) -> Result<Option<ReadMark>> {
        Ok(self
            .tables
            .read()
            .await
            .read_marks
            .get(&(*ticket_id, *user_id))
            .copied())
    }

    async fn unread_counts(&self, query: &UnreadQuery) -> Result<HashMap<TicketId, u64>> {
        let tables = self.tables.read().await;
        let mut counts: HashMap<TicketId, u64> = tables
            .tickets
            .values()
            .filter(|t| query.customer_id.is_none_or(|c| t.customer_id == c))
            .map(|t| (t.id, 0))
            .collect();

        for reply in tables.replies.values() {
            if reply.role != query.author_role {
                continue;
            }
            let Some(count) = counts.get_mut(&reply.ticket_id) else {
                continue;
            };
            let last_read = tables
                .read_marks
                .get(&(reply.ticket_id, query.viewer))
                .map(|m| m.last_read_at);
            if last_read.is_none_or(|at| reply.created_at > at) {
                *count += 1;
            }
        }

        Ok(counts)
    }
}

#[async_trait]
impl AttachmentRepository for MemoryStorage {
    async fn load_attachment(&self, id: &AttachmentId) -> Result<Attachment> {
        self.tables
            .read()
            .await
            .attachments
            .get(id)
            .cloned()
            .ok_or_else(|| HelpdeskError::attachment_not_found(id))
    }

    async fn list_ticket_attachments(&self, ticket_id: &TicketId) -> Result<Vec<Attachment>> {
        let owner = AttachmentOwner::Ticket(*ticket_id);
        let tables = self.tables.read().await;
        let mut attachments: Vec<Attachment> = tables
            .attachments
            .values()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(attachments)
    }

    async fn list_reply_attachments(&self, reply_id: &ReplyId) -> Result<Vec<Attachment>> {
        let owner = AttachmentOwner::Reply(*reply_id);
        let tables = self.tables.read().await;
        let mut attachments: Vec<Attachment> = tables
            .attachments
            .values()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(attachments)
    }

    async fn delete_attachment(&self, id: &AttachmentId) -> Result<()> {
        self.tables
            .write()
            .await
            .attachments
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HelpdeskError::attachment_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ReplyBuilder, TicketBuilder};
    use chrono::Duration;

    #[tokio::test]
    async fn test_ticket_save_and_load() {
        let storage = MemoryStorage::new();
        let ticket = TicketBuilder::new().title("VPN drops").build();

        storage.insert_ticket(&ticket).await.unwrap();
        let loaded = storage.load_ticket(&ticket.id).await.unwrap();
        assert_eq!(loaded, ticket);
    }

    #[tokio::test]
    async fn test_load_missing_ticket() {
        let storage = MemoryStorage::new();
        let err = storage.load_ticket(&TicketId::new()).await.unwrap_err();
        assert!(matches!(err, HelpdeskError::NotFound { entity: "Ticket", .. }));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let storage = MemoryStorage::new();
        let base = Utc::now();
        let older = TicketBuilder::new().title("older").created_at(base).build();
        let newer = TicketBuilder::new()
            .title("newer")
            .created_at(base + Duration::minutes(5))
            .build();
        storage.insert_ticket(&older).await.unwrap();
        storage.insert_ticket(&newer).await.unwrap();

        let listed = storage.list_tickets(&TicketFilter::default()).await.unwrap();
        assert_eq!(listed[0].title, "newer");
        assert_eq!(listed[1].title, "older");
    }

    #[tokio::test]
    async fn test_read_mark_never_moves_backwards() {
        let storage = MemoryStorage::new();
        let ticket_id = TicketId::new();
        let user_id = UserId::new();
        let later = Utc::now();
        let earlier = later - Duration::hours(1);

        for at in [later, earlier] {
            storage
                .upsert_read_mark(&ReadMark {
                    ticket_id,
                    user_id,
                    last_read_at: at,
                })
                .await
                .unwrap();
        }

        let mark = storage
            .load_read_mark(&ticket_id, &user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mark.last_read_at, later);
    }

    #[tokio::test]
    async fn test_delete_ticket_cascades() {
        let storage = MemoryStorage::new();
        let ticket = TicketBuilder::new().build();
        let reply = ReplyBuilder::new(ticket.id, UserId::new(), Role::Admin)
            .message("hi")
            .build();
        storage.insert_ticket(&ticket).await.unwrap();
        storage.insert_reply(&reply).await.unwrap();

        storage.delete_ticket(&ticket.id).await.unwrap();
        assert!(storage.list_replies(&ticket.id).await.unwrap().is_empty());
        assert!(storage.delete_ticket(&ticket.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_status_refuses_closed_ticket() {
        let storage = MemoryStorage::new();
        let ticket = TicketBuilder::new().status(Status::Closed).build();
        storage.insert_ticket(&ticket).await.unwrap();

        let err = storage
            .update_status(&ticket.id, Status::InProgress, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HelpdeskError::TerminalState { .. }));
        assert_eq!(
            storage.load_ticket(&ticket.id).await.unwrap().status,
            Status::Closed
        );
    }

    #[tokio::test]
    async fn test_close_stale_answered_rechecks_current_rows() {
        let storage = MemoryStorage::new();
        let base = Utc::now();
        let ticket = TicketBuilder::new().status(Status::Answered).build();
        storage.insert_ticket(&ticket).await.unwrap();
        let cutoff = base + Duration::days(1);

        // No replies yet
        assert!(!storage.close_stale_answered(&ticket.id, cutoff, cutoff).await.unwrap());

        let admin_reply = ReplyBuilder::new(ticket.id, UserId::new(), Role::Admin)
            .created_at(base)
            .build();
        storage.insert_reply(&admin_reply).await.unwrap();

        storage
            .update_status(&ticket.id, Status::InProgress, base)
            .await
            .unwrap();
        assert!(!storage.close_stale_answered(&ticket.id, cutoff, cutoff).await.unwrap());

        storage
            .update_status(&ticket.id, Status::Answered, base)
            .await
            .unwrap();
        assert!(!storage.close_stale_answered(&ticket.id, base, base).await.unwrap());
        assert!(storage.close_stale_answered(&ticket.id, cutoff, cutoff).await.unwrap());
        assert_eq!(
            storage.load_ticket(&ticket.id).await.unwrap().status,
            Status::Closed
        );
    }
}
