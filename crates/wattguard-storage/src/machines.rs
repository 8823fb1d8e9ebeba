//! Machine registry repository.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wattguard_core::credential::generate_agent_token;
use wattguard_core::domain::{Machine, MachineStatus};
use wattguard_core::error::RegistryError;

use crate::error::StorageError;

/// The outcome of a registration call: whether the machine was newly
/// created or already existed (and was therefore re-registered).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    New,
    ReRegistered,
}

/// Register (or re-register) a machine by fingerprint. On first contact this
/// creates the `Machine` row and its `AgentToken`; on every subsequent
/// contact it updates the machine's metadata and status, and always issues
/// and stores a freshly rotated agent token — the previous raw token becomes
/// immediately unusable.
///
/// # Errors
///
/// Returns [`StorageError`] on database failure.
pub async fn register(
    pool: &PgPool,
    fingerprint: &str,
    hostname: &str,
    os_type: &str,
    os_version: Option<&str>,
    ip_address: Option<&str>,
    agent_version: Option<&str>,
) -> Result<(Machine, String, RegistrationOutcome), StorageError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, Machine>("SELECT * FROM machines WHERE fingerprint = $1 FOR UPDATE")
        .bind(fingerprint)
        .fetch_optional(&mut *tx)
        .await?;

    let (raw_token, token_hash) = generate_agent_token();

    let (machine, outcome) = if let Some(machine) = existing {
        let machine = sqlx::query_as::<_, Machine>(
            r"UPDATE machines
              SET hostname = $2,
                  os_type = $3,
                  os_version = COALESCE($4, os_version),
                  ip_address = COALESCE($5, ip_address),
                  agent_version = COALESCE($6, agent_version),
                  status = 'online',
                  last_seen = now()
              WHERE id = $1
              RETURNING *",
        )
        .bind(machine.id)
        .bind(hostname)
        .bind(os_type)
        .bind(os_version)
        .bind(ip_address)
        .bind(agent_version)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"INSERT INTO agent_tokens (machine_id, token_hash)
              VALUES ($1, $2)
              ON CONFLICT (machine_id) DO UPDATE SET token_hash = EXCLUDED.token_hash, revoked = FALSE",
        )
        .bind(machine.id)
        .bind(&token_hash)
        .execute(&mut *tx)
        .await?;

        (machine, RegistrationOutcome::ReRegistered)
    } else {
        let machine = sqlx::query_as::<_, Machine>(
            r"INSERT INTO machines (fingerprint, hostname, os_type, os_version, ip_address, agent_version, status)
              VALUES ($1, $2, $3, $4, $5, $6, 'online')
              RETURNING *",
        )
        .bind(fingerprint)
        .bind(hostname)
        .bind(os_type)
        .bind(os_version)
        .bind(ip_address)
        .bind(agent_version)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO agent_tokens (machine_id, token_hash) VALUES ($1, $2)")
            .bind(machine.id)
            .bind(&token_hash)
            .execute(&mut *tx)
            .await?;

        (machine, RegistrationOutcome::New)
    };

    tx.commit().await?;

    Ok((machine, raw_token, outcome))
}

/// Resolve an agent bearer token to its owning machine, rejecting revoked
/// tokens, and stamp the token's `last_used` timestamp.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidAgentToken`] if no live token matches.
pub async fn find_by_agent_token(pool: &PgPool, token_hash: &str) -> Result<Machine, RegistryError> {
    let row = sqlx::query_as::<_, (Uuid,)>(
        r"UPDATE agent_tokens SET last_used = now()
          WHERE token_hash = $1 AND revoked = FALSE
          RETURNING machine_id",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .map_err(|e| RegistryError::Storage(e.to_string()))?
    .ok_or(RegistryError::InvalidAgentToken)?;

    sqlx::query_as::<_, Machine>("SELECT * FROM machines WHERE id = $1")
        .bind(row.0)
        .fetch_optional(pool)
        .await
        .map_err(|e| RegistryError::Storage(e.to_string()))?
        .ok_or(RegistryError::MachineNotFound)
}

/// List machines, optionally filtered by status and a case-insensitive
/// search term over hostname/fingerprint/IP, newest-seen first.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure.
pub async fn list(
    pool: &PgPool,
    status: Option<MachineStatus>,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Machine>, StorageError> {
    let like = search.map(|s| format!("%{s}%"));

    let machines = sqlx::query_as::<_, Machine>(
        r"SELECT * FROM machines
          WHERE ($1::text IS NULL OR status = $1)
            AND ($2::text IS NULL OR hostname ILIKE $2 OR fingerprint ILIKE $2 OR ip_address ILIKE $2)
          ORDER BY last_seen DESC
          LIMIT $3 OFFSET $4",
    )
    .bind(status)
    .bind(like)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(machines)
}

/// Fetch a single machine by id.
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] if no such machine exists.
pub async fn get(pool: &PgPool, id: Uuid) -> Result<Machine, StorageError> {
    sqlx::query_as::<_, Machine>("SELECT * FROM machines WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StorageError::NotFound("machine not found".to_owned()))
}

/// Apply an admin edit to a machine's free-text notes and/or hostname.
///
/// # Errors
///
/// Returns [`StorageError::NotFound`] if no such machine exists.
pub async fn patch(
    pool: &PgPool,
    id: Uuid,
    notes: Option<&str>,
    hostname: Option<&str>,
) -> Result<Machine, StorageError> {
    sqlx::query_as::<_, Machine>(
        r"UPDATE machines
          SET notes = COALESCE($2, notes),
              hostname = COALESCE($3, hostname)
          WHERE id = $1
          RETURNING *",
    )
    .bind(id)
    .bind(notes)
    .bind(hostname)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StorageError::NotFound("machine not found".to_owned()))
}

/// Revoke a machine's current agent token, forcing it to re-register before
/// it can reach any agent-bearer route again.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure.
pub async fn revoke_agent_token(pool: &PgPool, machine_id: Uuid) -> Result<(), StorageError> {
    sqlx::query("UPDATE agent_tokens SET revoked = TRUE WHERE machine_id = $1 AND revoked = FALSE")
        .bind(machine_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Transition every machine in {online, idle} whose `last_seen` is older
/// than `offline_window` to `offline`. Returns the number of rows changed.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure.
pub async fn mark_stale_offline(pool: &PgPool, offline_window: Duration) -> Result<u64, StorageError> {
    let cutoff: DateTime<Utc> = Utc::now() - offline_window;

    let result = sqlx::query(
        r"UPDATE machines
          SET status = 'offline'
          WHERE status IN ('online', 'idle') AND last_seen < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
