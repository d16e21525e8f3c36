//! Error types for the helpdesk service
//!
//! Every operation returns [`Result`], and every failure is recovered at the
//! request boundary. Under the `api` feature the error converts into an HTTP
//! response carrying a user-facing message.

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, HelpdeskError>;

/// Errors raised by the helpdesk core, storage and configuration layers
#[derive(Error, Debug)]
pub enum HelpdeskError {
    /// The requested status is not one of the four lifecycle values
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// The requested urgency is not one of the three allowed levels
    #[error("Invalid urgency: {0}")]
    InvalidUrgency(String),

    /// The role string is neither `admin` nor `customer`
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// The ticket is closed and accepts no further changes
    #[error("Ticket {id} is closed and can no longer change")]
    TerminalState { id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Neither a message nor any attachment was supplied
    #[error("Reply must contain a message or at least one attachment")]
    EmptyReply,

    /// Reply still owns attachment rows that must be removed first
    #[error("Reply {id} still has attachments; remove them first")]
    HasAttachments { id: String },

    #[error("Missing or malformed identity: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HelpdeskError {
    /// Shorthand for a missing ticket
    pub fn ticket_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Ticket",
            id: id.to_string(),
        }
    }

    pub fn reply_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Reply",
            id: id.to_string(),
        }
    }

    pub fn attachment_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Attachment",
            id: id.to_string(),
        }
    }

    /// Whether the error comes from the caller's request rather than the server
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Migration(_)
                | Self::Config(_)
                | Self::Io(_)
                | Self::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for HelpdeskError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for HelpdeskError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<csv::Error> for HelpdeskError {
    fn from(e: csv::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(feature = "api")]
mod response {
    use super::HelpdeskError;
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use serde_json::json;

    impl HelpdeskError {
        /// HTTP status code the error maps to
        #[must_use]
        pub const fn status_code(&self) -> StatusCode {
            match self {
                Self::InvalidStatus(_)
                | Self::InvalidUrgency(_)
                | Self::InvalidRole(_)
                | Self::EmptyReply
                | Self::Validation(_) => StatusCode::BAD_REQUEST,
                Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                Self::Forbidden(_) => StatusCode::FORBIDDEN,
                Self::NotFound { .. } => StatusCode::NOT_FOUND,
                Self::TerminalState { .. } | Self::HasAttachments { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for HelpdeskError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            let message = if self.is_client_error() {
                self.to_string()
            } else {
                tracing::error!("Request failed: {self}");
                "Internal server error".to_string()
            };

            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}
