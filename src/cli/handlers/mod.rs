//! Command handlers for the CLI
//!
//! Each subcommand gets its own module; `main` resolves the configuration
//! and dispatches here.

mod auto_close;
mod export;
mod init_db;
#[cfg(feature = "api")]
mod serve;

pub use auto_close::handle_auto_close_command;
pub use export::{export_tickets, handle_export_command};
pub use init_db::handle_init_db_command;
#[cfg(feature = "api")]
pub use serve::handle_serve_command;
