//! Operator (dashboard account) repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wattguard_core::domain::Operator;

use crate::error::StorageError;

/// Look up an operator by normalized (trimmed, lowercased) username.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure. A missing row is
/// `Ok(None)`, not an error — callers must still fall through to the
/// timing-dummy verify path.
pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Operator>, StorageError> {
    let operator = sqlx::query_as::<_, Operator>("SELECT * FROM operators WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(operator)
}

/// Look up an operator by id.
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] if no such operator exists.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Operator, StorageError> {
    sqlx::query_as::<_, Operator>("SELECT * FROM operators WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StorageError::NotFound("operator not found".to_owned()))
}

/// Record a successful login: reset the failure counter and lockout, stamp
/// `last_login`, and optionally replace the stored hash with a freshly
/// computed one (the KDF-parameter-upgrade path).
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] if the operator no longer exists.
pub async fn record_login_success(
    pool: &PgPool,
    id: Uuid,
    rehashed_password: Option<&str>,
) -> Result<Operator, StorageError> {
    let operator = sqlx::query_as::<_, Operator>(
        r"UPDATE operators
          SET failed_login_attempts = 0,
              locked_until = NULL,
              last_login = now(),
              updated_at = now(),
              password_hash = COALESCE($2, password_hash)
          WHERE id = $1
          RETURNING *",
    )
    .bind(id)
    .bind(rehashed_password)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StorageError::NotFound("operator not found".to_owned()))?;

    Ok(operator)
}

/// Record a failed login attempt, incrementing the failure counter and, if
/// `threshold` is reached, setting `locked_until = now() + lockout_window`
/// and resetting the counter to zero.
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] if the operator no longer exists.
pub async fn record_login_failure(
    pool: &PgPool,
    id: Uuid,
    threshold: i32,
    lockout_window: chrono::Duration,
) -> Result<Operator, StorageError> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Operator>("SELECT * FROM operators WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StorageError::NotFound("operator not found".to_owned()))?;

    let attempts = current.failed_login_attempts + 1;
    let (attempts, locked_until): (i32, Option<DateTime<Utc>>) = if attempts >= threshold {
        (0, Some(Utc::now() + lockout_window))
    } else {
        (attempts, None)
    };

    let updated = sqlx::query_as::<_, Operator>(
        r"UPDATE operators
          SET failed_login_attempts = $2,
              locked_until = COALESCE($3, locked_until),
              updated_at = now()
          WHERE id = $1
          RETURNING *",
    )
    .bind(id)
    .bind(attempts)
    .bind(locked_until)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(updated)
}
