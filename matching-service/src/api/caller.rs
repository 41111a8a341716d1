//! Caller identity
//!
//! The gateway in front of this service authenticates the user and forwards
//! the id in `X-User-Id`. Requests without a parseable id are rejected with
//! 401 before reaching a handler.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

impl CallerId {
    /// 403 unless the caller is `user_id`
    pub fn ensure_owner(&self, user_id: Uuid) -> ApiResult<()> {
        if self.0 != user_id {
            return Err(ApiError::Forbidden(format!(
                "user {} cannot act on behalf of {}",
                self.0, user_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?;

        let raw = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("X-User-Id header is not valid text".to_string()))?;

        Uuid::parse_str(raw.trim())
            .map(CallerId)
            .map_err(|_| ApiError::Unauthorized(format!("invalid user id '{}'", raw)))
    }
}
