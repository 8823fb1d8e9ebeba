//! Refresh-token repository.
//!
//! Tokens are stored only as their SHA-256 digest (see
//! `wattguard_core::credential::hash_token`); the plaintext never reaches
//! this layer at all.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wattguard_core::domain::RefreshToken;

use crate::error::StorageError;

/// Persist a freshly issued refresh token digest.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure.
pub async fn create(
    pool: &PgPool,
    operator_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    user_agent: Option<&str>,
    ip_address: Option<&str>,
) -> Result<RefreshToken, StorageError> {
    let token = sqlx::query_as::<_, RefreshToken>(
        r"INSERT INTO refresh_tokens (operator_id, token_hash, expires_at, user_agent, ip_address)
          VALUES ($1, $2, $3, $4, $5)
          RETURNING *",
    )
    .bind(operator_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(user_agent)
    .bind(ip_address)
    .fetch_one(pool)
    .await?;

    Ok(token)
}

/// Look up a refresh token by its digest.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure. A missing row is
/// `Ok(None)`.
pub async fn find_by_hash(pool: &PgPool, token_hash: &str) -> Result<Option<RefreshToken>, StorageError> {
    let token = sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

    Ok(token)
}

/// Mark a refresh token revoked, inside an already-open transaction — used
/// by the rotation path so the revoke and the new row it's paired with
/// commit atomically.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure.
pub async fn revoke_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> Result<(), StorageError> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Revoke a refresh token by digest, but only if it belongs to `operator_id`
/// — the logout path's authorization check.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure. Revoking a token
/// that doesn't exist or belongs to someone else is a silent no-op, matching
/// logout's "always succeed" contract.
pub async fn revoke_if_owned(
    pool: &PgPool,
    token_hash: &str,
    operator_id: Uuid,
) -> Result<(), StorageError> {
    sqlx::query(
        r"UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now()
          WHERE token_hash = $1 AND operator_id = $2 AND revoked = FALSE",
    )
    .bind(token_hash)
    .bind(operator_id)
    .execute(pool)
    .await?;

    Ok(())
}
