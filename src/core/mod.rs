//! Core domain types for the helpdesk
//!
//! Tickets, replies, read-marks, attachments and the authenticated
//! principal that every operation acts on behalf of.

mod builders;
mod ids;
mod principal;
mod reply;
mod status;
mod ticket;

pub use builders::{ReplyBuilder, TicketBuilder};
pub use ids::{AttachmentId, ReplyId, TicketId, UserId};
pub use principal::{Principal, Role};
pub use reply::{Attachment, AttachmentOwner, NewAttachment, ReadMark, Reply};
pub use status::{Status, Urgency};
pub use ticket::{NewTicket, Ticket};
