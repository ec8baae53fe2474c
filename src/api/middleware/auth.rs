//! Requester identity extraction
//!
//! Credential issuance and session validation are external collaborators:
//! an upstream authenticator terminates the token and forwards the verified
//! user id in a header. This module only extracts that identity.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::api::types::ApiError;

/// Header carrying the upstream-verified user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor that requires an authenticated requester
#[derive(Debug, Clone, Copy)]
pub struct Requester(pub Uuid);

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        requester_id(&parts.headers)
            .map(Requester)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Parses the requester id from headers, if one is attached
pub fn requester_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}
