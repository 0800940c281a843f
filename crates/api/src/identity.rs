//! Request identity resolution.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{Identity, SessionToken, UserId};
use thiserror::Error;

use crate::error::ApiError;

/// Header carrying an authenticated user id (UUID).
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying a guest session token. The token is opaque and
/// unauthenticated: it only partitions carts and orders.
pub const SESSION_ID_HEADER: &str = "x-session-id";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid x-user-id header")]
    InvalidUserId,

    #[error("Missing identity: send an x-user-id or x-session-id header")]
    Missing,
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Resolves the caller's identity. A user id wins over a session token.
pub fn resolve(headers: &HeaderMap) -> Result<Identity, IdentityError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(raw) = header(USER_ID_HEADER) {
        let uuid = uuid::Uuid::parse_str(raw).map_err(|_| IdentityError::InvalidUserId)?;
        return Ok(Identity::User(UserId::from_uuid(uuid)));
    }

    header(SESSION_ID_HEADER)
        .and_then(SessionToken::new)
        .map(Identity::Guest)
        .ok_or(IdentityError::Missing)
}

/// Extractor for the caller's [`Identity`].
#[derive(Debug, Clone)]
pub struct ResolvedIdentity(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for ResolvedIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ResolvedIdentity(resolve(&parts.headers)?))
    }
}
