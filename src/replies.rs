//! Reply thread manager
//!
//! Replies are appended to a ticket's thread, may be edited by their author,
//! and may only be deleted once their attachments are gone so that no file
//! is left pointing at a missing reply.

use crate::clock::Clock;
use crate::core::{
    Attachment, AttachmentOwner, NewAttachment, Principal, Reply, ReplyBuilder, ReplyId, TicketId,
};
use crate::error::{HelpdeskError, Result};
use crate::lifecycle::ensure_visible;
use crate::storage::{AttachmentRepository, ReplyRepository, Repository, TicketRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// A reply together with the files attached to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyWithAttachments {
    #[serde(flatten)]
    pub reply: Reply,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone)]
pub struct ReplyThread {
    store: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
}

impl ReplyThread {
    pub fn new(store: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Append a reply to a ticket's thread
    ///
    /// The reply row is written first, then one attachment row per file. The
    /// author's current role is snapshotted onto the reply.
    ///
    /// # Errors
    ///
    /// `EmptyReply` when both the message and the attachment list are empty,
    /// `Forbidden` when a customer replies on someone else's ticket and
    /// `TerminalState` when the ticket is closed.
    pub async fn add_reply(
        &self,
        ticket_id: &TicketId,
        author: &Principal,
        message: &str,
        attachments: Vec<NewAttachment>,
    ) -> Result<ReplyWithAttachments> {
        if message.trim().is_empty() && attachments.is_empty() {
            return Err(HelpdeskError::EmptyReply);
        }

        let ticket = self.store.load_ticket(ticket_id).await?;
        ensure_visible(&ticket, author)?;
        if ticket.status.is_terminal() {
            return Err(HelpdeskError::TerminalState {
                id: ticket_id.to_string(),
            });
        }

        let now = self.clock.now();
        let reply = ReplyBuilder::new(*ticket_id, author.id, author.role)
            .message(message.trim())
            .created_at(now)
            .build();
        let stored: Vec<_> = attachments
            .into_iter()
            .map(|file| {
                file.into_attachment(AttachmentOwner::Reply(reply.id), *ticket_id, author.id, now)
            })
            .collect();
        self.store
            .insert_reply_with_attachments(&reply, &stored)
            .await?;

        info!(
            "{} {} replied on ticket {ticket_id} ({} attachments)",
            author.role,
            author.id,
            stored.len()
        );
        Ok(ReplyWithAttachments {
            reply,
            attachments: stored,
        })
    }

    /// Delete a reply that no longer has attachments
    ///
    /// # Errors
    ///
    /// `HasAttachments` while any attachment still references the reply, no
    /// matter who asks; `Forbidden` unless the actor is the author or an
    /// admin.
    pub async fn delete_reply(
        &self,
        ticket_id: &TicketId,
        reply_id: &ReplyId,
        actor: &Principal,
    ) -> Result<()> {
        let reply = self.store.load_reply(ticket_id, reply_id).await?;

        if !self.store.list_reply_attachments(reply_id).await?.is_empty() {
            return Err(HelpdeskError::HasAttachments {
                id: reply_id.to_string(),
            });
        }

        if reply.author_id != actor.id && !actor.is_admin() {
            return Err(HelpdeskError::Forbidden(
                "only the author or an administrator can delete a reply".to_string(),
            ));
        }

        self.store.delete_reply(reply_id).await?;
        info!("Reply {reply_id} on ticket {ticket_id} deleted by {}", actor.id);
        Ok(())
    }

    /// Replace the message of a reply
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the actor wrote the reply, `EmptyReply` for a blank
    /// message.
    pub async fn edit_reply(
        &self,
        ticket_id: &TicketId,
        reply_id: &ReplyId,
        actor: &Principal,
        new_message: &str,
    ) -> Result<Reply> {
        let mut reply = self.store.load_reply(ticket_id, reply_id).await?;
        if reply.author_id != actor.id {
            return Err(HelpdeskError::Forbidden(
                "only the author can edit a reply".to_string(),
            ));
        }

        let message = new_message.trim();
        if message.is_empty() {
            return Err(HelpdeskError::EmptyReply);
        }

        let now = self.clock.now();
        self.store
            .update_reply_message(reply_id, message, now)
            .await?;

        reply.message = message.to_string();
        reply.updated_at = now;
        Ok(reply)
    }

    /// Full thread of a ticket, oldest reply first
    pub async fn thread(&self, ticket_id: &TicketId) -> Result<Vec<ReplyWithAttachments>> {
        let replies = self.store.list_replies(ticket_id).await?;
        let mut thread = Vec::with_capacity(replies.len());
        for reply in replies {
            let attachments = self.store.list_reply_attachments(&reply.id).await?;
            thread.push(ReplyWithAttachments { reply, attachments });
        }
        Ok(thread)
    }
}
