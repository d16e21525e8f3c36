//! Ticket intake and browsing
//!
//! Customers file tickets and browse their own; admins browse and delete any
//! ticket. Attachment removal also lives here since attachments may hang off
//! either a ticket or one of its replies.

use crate::clock::Clock;
use crate::core::{
    Attachment, AttachmentId, AttachmentOwner, NewTicket, Principal, Role, Ticket, TicketBuilder,
    TicketId,
};
use crate::error::{HelpdeskError, Result};
use crate::lifecycle::ensure_visible;
use crate::replies::{ReplyThread, ReplyWithAttachments};
use crate::storage::{
    AttachmentRepository, ReplyRepository, Repository, TicketFilter, TicketRepository,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// A ticket with its files and conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub attachments: Vec<Attachment>,
    pub replies: Vec<ReplyWithAttachments>,
}

#[derive(Clone)]
pub struct TicketDesk {
    store: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    replies: ReplyThread,
}

impl TicketDesk {
    pub fn new(store: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        let replies = ReplyThread::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            replies,
        }
    }

    /// File a new ticket on behalf of a customer
    pub async fn open_ticket(&self, customer: &Principal, new: NewTicket) -> Result<TicketDetail> {
        if customer.role != Role::Customer {
            return Err(HelpdeskError::Forbidden(
                "tickets are filed by customers".to_string(),
            ));
        }
        let title = new.title.trim();
        if title.is_empty() {
            return Err(HelpdeskError::Validation("title must not be empty".to_string()));
        }

        let now = self.clock.now();
        let ticket = TicketBuilder::new()
            .title(title)
            .description(new.description.trim())
            .urgency(new.urgency)
            .product(new.product.trim())
            .customer(customer.id)
            .created_at(now)
            .build();
        let attachments: Vec<_> = new
            .attachments
            .into_iter()
            .map(|file| {
                file.into_attachment(AttachmentOwner::Ticket(ticket.id), ticket.id, customer.id, now)
            })
            .collect();
        self.store
            .insert_ticket_with_attachments(&ticket, &attachments)
            .await?;

        info!("Customer {} opened ticket {}", customer.id, ticket.id);
        Ok(TicketDetail {
            ticket,
            attachments,
            replies: Vec::new(),
        })
    }

    /// Tickets visible to the viewer, newest first
    ///
    /// Customers are always restricted to their own tickets regardless of the
    /// filter's `customer_id`.
    pub async fn list_tickets(
        &self,
        viewer: &Principal,
        mut filter: TicketFilter,
    ) -> Result<Vec<Ticket>> {
        if viewer.role == Role::Customer {
            filter.customer_id = Some(viewer.id);
        }
        self.store.list_tickets(&filter).await
    }

    pub async fn ticket_detail(&self, ticket_id: &TicketId, viewer: &Principal) -> Result<TicketDetail> {
        let ticket = self.store.load_ticket(ticket_id).await?;
        ensure_visible(&ticket, viewer)?;

        let attachments = self.store.list_ticket_attachments(ticket_id).await?;
        let replies = self.replies.thread(ticket_id).await?;
        Ok(TicketDetail {
            ticket,
            attachments,
            replies,
        })
    }

    /// Remove a ticket and everything hanging off it
    pub async fn delete_ticket(&self, ticket_id: &TicketId, actor: &Principal) -> Result<()> {
        if !actor.is_admin() {
            return Err(HelpdeskError::Forbidden(
                "only administrators can delete tickets".to_string(),
            ));
        }
        self.store.delete_ticket(ticket_id).await?;
        info!("Ticket {ticket_id} deleted by {}", actor.id);
        Ok(())
    }

    /// Remove one attachment's metadata row
    ///
    /// Allowed for admins and for the owning author: the ticket's customer for
    /// ticket-level files, the reply's author for reply-level files.
    pub async fn delete_attachment(&self, id: &AttachmentId, actor: &Principal) -> Result<Attachment> {
        let attachment = self.store.load_attachment(id).await?;

        if !actor.is_admin() {
            let owner = match attachment.owner {
                AttachmentOwner::Ticket(ticket_id) => {
                    self.store.load_ticket(&ticket_id).await?.customer_id
                },
                AttachmentOwner::Reply(reply_id) => {
                    self.store
                        .load_reply(&attachment.ticket_id, &reply_id)
                        .await?
                        .author_id
                },
            };
            if owner != actor.id {
                return Err(HelpdeskError::Forbidden(
                    "only the owning author or an administrator can remove this file".to_string(),
                ));
            }
        }

        self.store.delete_attachment(id).await?;
        info!("Attachment {id} ({}) removed by {}", attachment.original_name, actor.id);
        Ok(attachment)
    }

    #[must_use]
    pub const fn replies(&self) -> &ReplyThread {
        &self.replies
    }
}
