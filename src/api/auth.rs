//! Identity extraction
//!
//! The upstream auth gateway terminates sessions and forwards the caller as
//! two headers. They are trusted as given.

use crate::core::{Principal, Role, UserId};
use crate::error::HelpdeskError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = HelpdeskError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)?;
        let id = UserId::parse_str(id)
            .map_err(|_| HelpdeskError::Unauthorized(format!("{USER_ID_HEADER} is not a UUID")))?;
        let role = header(parts, USER_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(|e| HelpdeskError::Unauthorized(e.to_string()))?;
        Ok(Self::new(id, role))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, HelpdeskError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| HelpdeskError::Unauthorized(format!("missing {name} header")))
}

pub fn require_admin(principal: &Principal) -> Result<(), HelpdeskError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(HelpdeskError::Forbidden(
            "administrator access required".to_string(),
        ))
    }
}

pub fn require_customer(principal: &Principal) -> Result<(), HelpdeskError> {
    if principal.role == Role::Customer {
        Ok(())
    } else {
        Err(HelpdeskError::Forbidden("customer access required".to_string()))
    }
}
