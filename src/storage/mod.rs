//! Persistence layer
//!
//! The helpdesk talks to storage exclusively through the repository traits
//! in [`repository`]. [`SqliteStorage`] is the production backend,
//! [`MemoryStorage`] keeps everything in process.

mod memory;
mod repository;
mod sqlite;

pub use memory::MemoryStorage;
pub use repository::{
    AttachmentRepository, ReadMarkRepository, ReplyRepository, Repository, TicketFilter,
    TicketRepository, UnreadQuery,
};
pub use sqlite::SqliteStorage;
