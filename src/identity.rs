//! Caller identity as forwarded by the authenticating gateway.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, request::Parts},
};
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller passed explicitly to every core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserHandle {
    pub id: Uuid,
}

impl UserHandle {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

fn handle_from_headers(headers: &HeaderMap) -> Result<Option<UserHandle>, AppError> {
    let Some(value) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let id = value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("malformed `{USER_ID_HEADER}` header")))?;

    Ok(Some(UserHandle::new(id)))
}

impl<S> FromRequestParts<S> for UserHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        handle_from_headers(&parts.headers)?
            .ok_or_else(|| AppError::Unauthorized(format!("missing `{USER_ID_HEADER}` header")))
    }
}

impl<S> OptionalFromRequestParts<S> for UserHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        handle_from_headers(&parts.headers)
    }
}
