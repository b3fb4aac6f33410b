//! Caller identity and endpoint guards

pub mod middleware;
pub mod models;
pub mod verifier;

pub use middleware::{auth_middleware, webhook_token_middleware, AuthState, WebhookAuthState};
pub use models::{JwtClaims, OwnerIdentity};
pub use verifier::{IdentityVerifier, JwtVerifier};
