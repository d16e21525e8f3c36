//! HTTP API
//!
//! Exposes the helpdesk over JSON. Callers are identified by the headers in
//! [`auth`]; every error maps to a status code and a `{"error": ...}` body.

pub mod auth;
pub mod extract;
pub mod handlers;

use crate::error::Result;
use crate::service::Helpdesk;
use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use handlers::{access, dashboard, replies, tickets};

const CODE_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Build the application router
pub fn router(helpdesk: Arc<Helpdesk>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/tickets",
            get(tickets::list_all_tickets).post(tickets::create_ticket),
        )
        .route("/tickets/my", get(tickets::list_my_tickets))
        .route("/tickets/my/unread-counts", get(tickets::my_unread_counts))
        .route(
            "/tickets/admin/unread-counts",
            get(tickets::admin_unread_counts),
        )
        .route(
            "/tickets/:ticket_id",
            get(tickets::get_ticket).delete(tickets::delete_ticket),
        )
        .route("/tickets/:ticket_id/status", put(tickets::set_status))
        .route("/tickets/:ticket_id/read", post(tickets::mark_read))
        .route("/tickets/:ticket_id/replies", post(replies::add_reply))
        .route(
            "/tickets/:ticket_id/replies/:reply_id",
            put(replies::edit_reply).delete(replies::delete_reply),
        )
        .route("/attachments/:attachment_id", delete(tickets::delete_attachment))
        .route("/dashboard/auto-close", post(dashboard::auto_close))
        .route("/auth/email-code", post(access::issue_code))
        .route("/auth/email-code/verify", post(access::verify_code))
        .layer(TraceLayer::new_for_http())
        .with_state(helpdesk)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serve the API on `address` until Ctrl+C or SIGTERM
pub async fn serve(helpdesk: Arc<Helpdesk>, address: &str) -> Result<()> {
    let evictor = tokio::spawn(evict_codes(helpdesk.clone()));
    let app = router(helpdesk);

    let listener = TcpListener::bind(address).await?;
    info!("Helpdesk API listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    evictor.abort();
    info!("Server shut down");
    Ok(())
}

async fn evict_codes(helpdesk: Arc<Helpdesk>) {
    let mut interval = tokio::time::interval(CODE_EVICTION_INTERVAL);
    loop {
        interval.tick().await;
        helpdesk.codes.evict_expired().await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            },
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
