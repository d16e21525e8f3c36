use crate::api::extract::{ApiJson, ApiPath};
use crate::core::{NewAttachment, Principal, Reply, ReplyId, TicketId};
use crate::error::Result;
use crate::replies::ReplyWithAttachments;
use crate::service::Helpdesk;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct NewReply {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}

#[derive(Debug, Deserialize)]
pub struct EditReply {
    pub message: String,
}

pub async fn add_reply(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiPath(ticket_id): ApiPath<TicketId>,
    ApiJson(payload): ApiJson<NewReply>,
) -> Result<(StatusCode, Json<ReplyWithAttachments>)> {
    let created = helpdesk
        .replies
        .add_reply(&ticket_id, &principal, &payload.message, payload.attachments)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn edit_reply(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiPath((ticket_id, reply_id)): ApiPath<(TicketId, ReplyId)>,
    ApiJson(payload): ApiJson<EditReply>,
) -> Result<Json<Reply>> {
    let reply = helpdesk
        .replies
        .edit_reply(&ticket_id, &reply_id, &principal, &payload.message)
        .await?;
    Ok(Json(reply))
}

pub async fn delete_reply(
    State(helpdesk): State<Arc<Helpdesk>>,
    principal: Principal,
    ApiPath((ticket_id, reply_id)): ApiPath<(TicketId, ReplyId)>,
) -> Result<StatusCode> {
    helpdesk
        .replies
        .delete_reply(&ticket_id, &reply_id, &principal)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
