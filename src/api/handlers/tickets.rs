use crate::api::auth::{require_admin, require_customer};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::core::{AttachmentId, NewTicket, Principal, ReadMark, Status, Ticket, TicketId};
use crate::error::Result;
use crate::service::Helpdesk;
use crate::storage::TicketFilter;
use crate::tickets::TicketDetail;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub urgency: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<TicketFilter> {
        Ok(TicketFilter {
            customer_id: None,
            status: self.status.as_deref().map(str::parse).transpose()?,
            urgency: self.urgency.as_deref().map(str::parse).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

pub async fn create_ticket(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiJson(payload): ApiJson<NewTicket>,
) -> Result<(StatusCode, Json<TicketDetail>)> {
    let detail = helpdesk.desk.open_ticket(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_all_tickets(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Ticket>>> {
    require_admin(&principal)?;
    let tickets = helpdesk
        .desk
        .list_tickets(&principal, query.into_filter()?)
        .await?;
    Ok(Json(tickets))
}

pub async fn list_my_tickets(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Ticket>>> {
    require_customer(&principal)?;
    let tickets = helpdesk
        .desk
        .list_tickets(&principal, query.into_filter()?)
        .await?;
    Ok(Json(tickets))
}

pub async fn get_ticket(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiPath(ticket_id): ApiPath<TicketId>,
) -> Result<Json<TicketDetail>> {
    let detail = helpdesk.desk.ticket_detail(&ticket_id, &principal).await?;
    Ok(Json(detail))
}

pub async fn delete_ticket(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiPath(ticket_id): ApiPath<TicketId>,
) -> Result<StatusCode> {
    helpdesk.desk.delete_ticket(&ticket_id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_status(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiPath(ticket_id): ApiPath<TicketId>,
    ApiJson(change): ApiJson<StatusChange>,
) -> Result<Json<Ticket>> {
    let status: Status = change.status.parse()?;
    let ticket = helpdesk
        .lifecycle
        .set_status(&ticket_id, status, &principal)
        .await?;
    Ok(Json(ticket))
}

pub async fn mark_read(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiPath(ticket_id): ApiPath<TicketId>,
) -> Result<Json<ReadMark>> {
    let mark = helpdesk.lifecycle.mark_read(&ticket_id, &principal).await?;
    Ok(Json(mark))
}

pub async fn my_unread_counts(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
) -> Result<Json<BTreeMap<String, u64>>> {
    require_customer(&principal)?;
    unread_counts(&helpdesk, &principal).await
}

pub async fn admin_unread_counts(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
) -> Result<Json<BTreeMap<String, u64>>> {
    require_admin(&principal)?;
    unread_counts(&helpdesk, &principal).await
}

async fn unread_counts(
    helpdesk: &Helpdesk,
    principal: &Principal,
) -> Result<Json<BTreeMap<String, u64>>> {
    let counts = helpdesk.lifecycle.compute_unread_counts(principal).await?;
    Ok(Json(
        counts
            .into_iter()
            .map(|(id, count)| (id.to_string(), count))
            .collect(),
    ))
}

pub async fn delete_attachment(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiPath(attachment_id): ApiPath<AttachmentId>,
) -> Result<StatusCode> {
    helpdesk
        .desk
        .delete_attachment(&attachment_id, &principal)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
