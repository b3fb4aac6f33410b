use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use imgflow_core::AppError;
use serde::{Deserialize, Serialize};

use crate::error::HttpAppError;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Owner id; becomes the first segment of every object key the owner uploads
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Verified caller, stored in request extensions by the auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerIdentity {
    pub owner_id: String,
}

impl OwnerIdentity {
    /// Owner ids end up as a key prefix, so only a conservative character set is accepted.
    pub fn new(owner_id: impl Into<String>) -> Result<Self, AppError> {
        let owner_id = owner_id.into();
        let path_safe = !owner_id.is_empty()
            && owner_id.len() <= 128
            && !owner_id.starts_with('.')
            && owner_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '|'));

        if !path_safe {
            return Err(AppError::Unauthorized(
                "Token subject is not a valid owner id".to_string(),
            ));
        }
        Ok(Self { owner_id })
    }
}

impl<S> FromRequestParts<S> for OwnerIdentity
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OwnerIdentity>()
            .cloned()
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing verified identity".to_string(),
                ))
            })
    }
}
