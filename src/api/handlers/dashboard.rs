use crate::api::auth::require_admin;
use crate::core::Principal;
use crate::error::Result;
use crate::lifecycle::SweepReport;
use crate::service::Helpdesk;
use axum::{Json, extract::State};
use std::sync::Arc;

/// Run the SLA auto-close sweep on demand
pub async fn auto_close(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
) -> Result<Json<SweepReport>> {
    require_admin(&principal)?;
    let report = helpdesk.lifecycle.auto_close_stale_pending().await?;
    Ok(Json(report))
}
