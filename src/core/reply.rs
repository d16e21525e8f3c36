use super::{AttachmentId, ReplyId, Role, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A threaded message on a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: ReplyId,
    pub ticket_id: TicketId,
    pub author_id: UserId,
    /// Author role at the time the reply was written
    pub role: Role,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-viewer bookmark of the last time a ticket was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadMark {
    pub ticket_id: TicketId,
    pub user_id: UserId,
    pub last_read_at: DateTime<Utc>,
}

/// What an attachment hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AttachmentOwner {
    Ticket(TicketId),
    Reply(ReplyId),
}

/// Metadata for an uploaded file; the bytes live in external storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub owner: AttachmentOwner,
    /// Ticket the attachment belongs to, directly or through a reply
    pub ticket_id: TicketId,
    /// Name under which the storage collaborator keeps the file
    pub filename: String,
    pub original_name: String,
    pub uploaded_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Attachment metadata as received from the upload collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub filename: String,
    pub original_name: String,
}

impl NewAttachment {
    pub fn new(filename: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            original_name: original_name.into(),
        }
    }

    pub(crate) fn into_attachment(
        self,
        owner: AttachmentOwner,
        ticket_id: TicketId,
        uploaded_by: UserId,
        now: DateTime<Utc>,
    ) -> Attachment {
        Attachment {
            id: AttachmentId::new(),
            owner,
            ticket_id,
            filename: self.filename,
            original_name: self.original_name,
            uploaded_by,
            created_at: now,
        }
    }
}
