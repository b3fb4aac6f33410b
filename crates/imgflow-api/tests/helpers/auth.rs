use chrono::Utc;
use imgflow_api::auth::JwtClaims;
use jsonwebtoken::{encode, EncodingKey, Header};

use super::TEST_JWT_SECRET;

/// Signed bearer token for `owner_id`, valid for ten minutes.
pub fn token_for(owner_id: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: owner_id.to_string(),
        exp: now + 600,
        iat: Some(now),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
