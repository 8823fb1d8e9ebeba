//! Idempotent admin-account bootstrap, safe under N concurrently starting
//! server processes.
//!
//! Serialization is via a named Postgres advisory lock scoped to the
//! transaction (`pg_advisory_xact_lock`), not an application-level mutex —
//! it is held across process boundaries the way an in-process lock cannot
//! be, and is released automatically on commit or rollback.

use sqlx::PgPool;
use wattguard_core::domain::Role;
use wattguard_core::error::BootstrapError;

/// Arbitrary fixed key identifying the "admin bootstrap" critical section.
/// Any constant works as long as every process uses the same one.
const ADVISORY_LOCK_KEY: i64 = 0x5741_5447_4252_4400;

/// Ensure exactly one admin operator named `username` exists, creating one
/// with `initial_password` if none does. Returns `true` if a new row was
/// created, `false` if an admin already existed (the existing password is
/// always preserved).
///
/// # Errors
///
/// Returns [`BootstrapError::MissingInitialPassword`] if no admin exists yet
/// and `initial_password` is empty — this system never invents a password
/// to fall back on. Returns [`BootstrapError::Storage`] on any other
/// database failure; a duplicate-key error surfacing despite the advisory
/// lock (e.g. external intervention) is treated as success, not an error.
pub async fn ensure_admin_exists(
    pool: &PgPool,
    username: &str,
    initial_password: &str,
) -> Result<bool, BootstrapError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| BootstrapError::Storage(e.to_string()))?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(ADVISORY_LOCK_KEY)
        .execute(&mut *tx)
        .await
        .map_err(|e| BootstrapError::Storage(e.to_string()))?;

    let existing: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM operators WHERE username = $1")
        .bind(username)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| BootstrapError::Storage(e.to_string()))?;

    if existing.is_some() {
        tx.commit().await.map_err(|e| BootstrapError::Storage(e.to_string()))?;
        return Ok(false);
    }

    if initial_password.is_empty() {
        return Err(BootstrapError::MissingInitialPassword);
    }

    let password_hash = wattguard_core::credential::hash_password(initial_password)?;

    let insert = sqlx::query(
        r"INSERT INTO operators (username, password_hash, role, is_active)
          VALUES ($1, $2, $3, TRUE)",
    )
    .bind(username)
    .bind(&password_hash)
    .bind(Role::Admin)
    .execute(&mut *tx)
    .await;

    match insert {
        Ok(_) => {
            tx.commit().await.map_err(|e| BootstrapError::Storage(e.to_string()))?;
            Ok(true)
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            // Another actor won the race despite the advisory lock (e.g. a
            // manually inserted row). Treat as already-bootstrapped.
            Ok(false)
        }
        Err(e) => Err(BootstrapError::Storage(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::ADVISORY_LOCK_KEY;

    #[test]
    fn advisory_lock_key_is_stable() {
        assert_eq!(ADVISORY_LOCK_KEY, 0x5741_5447_4252_4400);
    }
}
