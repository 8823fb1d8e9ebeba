//! Signed access tokens (JWT) for operator sessions.
//!
//! Refresh tokens are opaque and handled by [`crate::credential`]; this
//! module only covers the short-lived, self-contained access token that
//! accompanies every authenticated operator request.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;
use crate::error::SessionError;

const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims carried by a signed access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Operator id.
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    /// Always `"access"` — distinguishes this token from any future token
    /// kind that might reuse the same signing secret.
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id, for audit correlation.
    pub jti: Uuid,
}

/// Issue a signed access token for `operator_id`/`username`/`role`, valid for
/// `ttl`. Returns the encoded token and its expiry timestamp.
///
/// # Errors
///
/// Returns [`SessionError::Sign`] if the underlying HMAC signing fails.
pub fn issue_access_token(
    operator_id: Uuid,
    username: &str,
    role: Role,
    secret: &[u8],
    ttl: Duration,
) -> Result<(String, DateTime<Utc>), SessionError> {
    let now = Utc::now();
    let expires_at = now + ttl;

    let claims = AccessClaims {
        sub: operator_id,
        username: username.to_owned(),
        role,
        token_type: ACCESS_TOKEN_TYPE.to_owned(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: Uuid::new_v4(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| SessionError::Sign(e.to_string()))?;

    Ok((token, expires_at))
}

/// Decode and verify a presented access token, rejecting expired tokens and
/// tokens whose `type` claim is not `"access"`.
///
/// # Errors
///
/// Returns [`SessionError::InvalidAccessToken`] on any signature, expiry, or
/// shape failure — the caller should treat all of these identically (401),
/// the same way the original system's `decode_access_token` collapses
/// `ExpiredSignatureError` and `InvalidTokenError` into a single `None`.
pub fn decode_access_token(token: &str, secret: &[u8]) -> Result<AccessClaims, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|_| SessionError::InvalidAccessToken)?;

    if data.claims.token_type != ACCESS_TOKEN_TYPE {
        return Err(SessionError::InvalidAccessToken);
    }

    Ok(data.claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-secret-at-least-32-bytes-long";

    #[test]
    fn issued_token_decodes_back_to_the_same_claims() {
        let operator_id = Uuid::new_v4();
        let (token, expires_at) =
            issue_access_token(operator_id, "admin", Role::Admin, SECRET, Duration::minutes(60)).unwrap();

        let claims = decode_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, operator_id);
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let operator_id = Uuid::new_v4();
        let (token, _) =
            issue_access_token(operator_id, "admin", Role::Viewer, SECRET, Duration::seconds(-60)).unwrap();

        let result = decode_access_token(&token, SECRET);
        assert!(matches!(result, Err(SessionError::InvalidAccessToken)));
    }

    #[test]
    fn token_signed_with_a_different_secret_is_rejected() {
        let operator_id = Uuid::new_v4();
        let (token, _) =
            issue_access_token(operator_id, "admin", Role::Admin, SECRET, Duration::minutes(60)).unwrap();

        let result = decode_access_token(&token, b"a-completely-different-secret-value");
        assert!(matches!(result, Err(SessionError::InvalidAccessToken)));
    }

    #[test]
    fn each_issued_token_gets_a_unique_jti() {
        let operator_id = Uuid::new_v4();
        let (token_a, _) =
            issue_access_token(operator_id, "admin", Role::Admin, SECRET, Duration::minutes(60)).unwrap();
        let (token_b, _) =
            issue_access_token(operator_id, "admin", Role::Admin, SECRET, Duration::minutes(60)).unwrap();

        let claims_a = decode_access_token(&token_a, SECRET).unwrap();
        let claims_b = decode_access_token(&token_b, SECRET).unwrap();
        assert_ne!(claims_a.jti, claims_b.jti);
    }
}
