use crate::api::extract::ApiJson;
use crate::error::Result;
use crate::service::Helpdesk;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CodeIssued {
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CodeCheck {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CodeVerdict {
    pub verified: bool,
}

pub async fn issue_code(
    State(helpdesk): State<Arc<Helpdesk>>,
    ApiJson(request): ApiJson<CodeRequest>,
) -> Result<(StatusCode, Json<CodeIssued>)> {
    let expires_at = helpdesk.codes.issue(&request.email).await?;
    Ok((StatusCode::ACCEPTED, Json(CodeIssued { expires_at })))
}

pub async fn verify_code(
    State(helpdesk): State<Arc<Helpdesk>>,
    ApiJson(check): ApiJson<CodeCheck>,
) -> Result<Json<CodeVerdict>> {
    let verified = helpdesk.codes.verify(&check.email, &check.code).await?;
    Ok(Json(CodeVerdict { verified }))
}
