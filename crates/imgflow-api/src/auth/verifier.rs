//! Bearer-token verification

use async_trait::async_trait;
use imgflow_core::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::models::{JwtClaims, OwnerIdentity};

/// Turns a bearer token into a verified owner
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<OwnerIdentity, AppError>;
}

/// HS256 JWTs signed with a shared secret; `sub` is the owner id.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<OwnerIdentity, AppError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "JWT rejected");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        OwnerIdentity::new(data.claims.sub)
    }
}
