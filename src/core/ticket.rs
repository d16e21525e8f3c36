use super::{NewAttachment, Status, TicketId, Urgency, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer support request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub description: String,
    pub urgency: Urgency,
    pub status: Status,
    pub product: String,
    /// Customer who filed the ticket
    pub customer_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a freshly filed ticket in the 접수 state
    #[must_use]
    pub fn new(customer_id: UserId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: TicketId::new(),
            title: title.into(),
            description: String::new(),
            urgency: Urgency::default(),
            status: Status::Received,
            product: String::new(),
            customer_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.customer_id == user
    }
}

/// Payload for filing a new ticket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}
