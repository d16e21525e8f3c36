use super::{Reply, ReplyId, Role, Status, Ticket, TicketId, Urgency, UserId};
use chrono::{DateTime, Utc};

/// Builder for creating Ticket instances
#[derive(Default)]
pub struct TicketBuilder {
    id: Option<TicketId>,
    title: Option<String>,
    description: Option<String>,
    urgency: Option<Urgency>,
    status: Option<Status>,
    product: Option<String>,
    customer_id: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl TicketBuilder {
    /// Create a new ticket builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn id(mut self, id: TicketId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    #[must_use]
    pub const fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Set the owning customer
    #[must_use]
    pub const fn customer(mut self, customer_id: UserId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Set `created_at`; `updated_at` follows it unless set explicitly
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub const fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Build the ticket
    pub fn build(self) -> Ticket {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        Ticket {
            id: self.id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            urgency: self.urgency.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            product: self.product.unwrap_or_default(),
            customer_id: self.customer_id.unwrap_or_default(),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}

/// Builder for creating Reply instances
pub struct ReplyBuilder {
    id: Option<ReplyId>,
    ticket_id: TicketId,
    author_id: UserId,
    role: Role,
    message: String,
    created_at: Option<DateTime<Utc>>,
}

impl ReplyBuilder {
    /// Start a reply on `ticket_id` by the given author
    #[must_use]
    pub fn new(ticket_id: TicketId, author_id: UserId, role: Role) -> Self {
        Self {
            id: None,
            ticket_id,
            author_id,
            role,
            message: String::new(),
            created_at: None,
        }
    }

    #[must_use]
    pub const fn id(mut self, id: ReplyId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn build(self) -> Reply {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        Reply {
            id: self.id.unwrap_or_default(),
            ticket_id: self.ticket_id,
            author_id: self.author_id,
            role: self.role,
            message: self.message,
            created_at,
            updated_at: created_at,
        }
    }
}
