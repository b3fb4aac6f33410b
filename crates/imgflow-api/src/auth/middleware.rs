use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use imgflow_core::{AppError, PipelineError};
use subtle::ConstantTimeEq;

use super::verifier::IdentityVerifier;
use crate::error::HttpAppError;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn IdentityVerifier>,
}

#[derive(Clone)]
pub struct WebhookAuthState {
    pub token: String,
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))
}

/// Verify the bearer token and attach the caller's `OwnerIdentity` to the request.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token.to_string(),
        Err(e) => return HttpAppError(e).into_response(),
    };

    match auth_state.verifier.verify(&token).await {
        Ok(identity) => {
            tracing::debug!(owner_id = %identity.owner_id, "Caller authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}

/// Guard for the notification endpoint: the bearer token must equal the shared webhook token.
pub async fn webhook_token_middleware(
    State(webhook): State<Arc<WebhookAuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = bearer_token(request.headers())
        .map(|token| secure_compare(token, &webhook.token))
        .unwrap_or(false);

    if !authorized {
        tracing::warn!("Notification delivery with missing or wrong webhook token");
        return HttpAppError(
            PipelineError::Unauthenticated("Invalid webhook token".to_string()).into(),
        )
        .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_secure_compare() {
        assert!(secure_compare("abc", "abc"));
        assert!(!secure_compare("abc", "abd"));
        assert!(!secure_compare("abc", "abcd"));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Bearer   "));
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Bearer tok"));
        assert_eq!(bearer_token(&headers).unwrap(), "tok");
    }
}
