//! helpdesk - ITSM helpdesk backend
//!
//! The core of the service is the ticket lifecycle:
//! - A status state machine (접수 → 진행중 → 답변 완료 → 종결) with a terminal
//!   closed state
//! - Reply threads between a ticket's customer and administrators
//! - Per-user read-marks and unread reply counts
//! - An SLA sweep that closes answered tickets left idle after an admin reply
//!
//! Storage goes through the repository traits in [`storage`]; SQLite via `sqlx`
//! is the production backend. The HTTP surface lives in `api` behind the
//! `api` feature.
//!
//! # Example
//!
//! ```rust,ignore
//! use helpdesk::clock::SystemClock;
//! use helpdesk::core::{NewTicket, Principal};
//! use helpdesk::storage::MemoryStorage;
//! use helpdesk::tickets::TicketDesk;
//! use std::sync::Arc;
//!
//! let desk = TicketDesk::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock));
//! let customer = Principal::customer();
//! let detail = desk.open_ticket(&customer, new_ticket).await?;
//! ```

// Allow missing error documentation for internal implementations
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod cli;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod lifecycle;
pub mod replies;
pub mod service;
pub mod storage;
pub mod tickets;

#[cfg(feature = "api")]
pub mod api;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use error::{HelpdeskError, Result};
