//! Schema presence verification.
//!
//! This crate never runs DDL. Table creation lives entirely in
//! `migrations/`, applied once via `sqlx migrate run` before any server
//! process starts — running `CREATE TABLE`/`CREATE TYPE` from multiple
//! concurrently-starting server processes risks catalog-level deadlocks.
//! At startup the server only verifies that the tables it depends on exist,
//! and fails fast with a clear message if they don't.

use sqlx::PgPool;

use crate::error::StorageError;

const REQUIRED_TABLES: &[&str] = &[
    "operators",
    "refresh_tokens",
    "machines",
    "agent_tokens",
    "heartbeats",
    "shutdown_commands",
    "audit_entries",
];

/// Verify that every table this crate depends on is present.
///
/// # Errors
///
/// Returns [`StorageError::SchemaMissing`] naming the first missing table,
/// or [`StorageError::Internal`] if the verification query itself fails.
pub async fn verify_schema(pool: &PgPool) -> Result<(), StorageError> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r"SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )",
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            return Err(StorageError::SchemaMissing((*table).to_owned()));
        }
    }

    Ok(())
}
