//! Shutdown-command dispatcher repository.
//!
//! Owns the per-machine single-pending-command invariant and the idempotent
//! result-reconciliation path.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wattguard_core::domain::{CommandStatus, Machine, MachineStatus, ShutdownCommand};
use wattguard_core::error::CommandError;

use crate::audit;

/// Issue a new shutdown command for `machine_id`, expiring any prior pending
/// command for the same machine in the same transaction, and writing an
/// audit entry.
///
/// # Errors
///
/// Returns [`CommandError::MachineNotFound`] if the machine doesn't exist,
/// or [`CommandError::MachineNotIdle`] if it is not currently idle.
pub async fn issue(
    pool: &PgPool,
    machine_id: Uuid,
    issued_by: Uuid,
    idle_threshold_minutes: i32,
    notes: Option<&str>,
    ttl: Duration,
) -> Result<ShutdownCommand, CommandError> {
    let mut tx = pool.begin().await.map_err(|e| CommandError::Storage(e.to_string()))?;

    let machine = sqlx::query_as::<_, Machine>("SELECT * FROM machines WHERE id = $1 FOR UPDATE")
        .bind(machine_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CommandError::Storage(e.to_string()))?
        .ok_or(CommandError::MachineNotFound)?;

    if machine.status != MachineStatus::Idle {
        return Err(CommandError::MachineNotIdle {
            current_status: format!("{:?}", machine.status).to_lowercase(),
        });
    }

    sqlx::query(
        "UPDATE shutdown_commands SET status = 'expired' WHERE machine_id = $1 AND status = 'pending'",
    )
    .bind(machine_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| CommandError::Storage(e.to_string()))?;

    let expires_at = Utc::now() + ttl;

    let command = sqlx::query_as::<_, ShutdownCommand>(
        r"INSERT INTO shutdown_commands (machine_id, issued_by, idle_threshold_minutes, expires_at, notes)
          VALUES ($1, $2, $3, $4, $5)
          RETURNING *",
    )
    .bind(machine_id)
    .bind(issued_by)
    .bind(idle_threshold_minutes)
    .bind(expires_at)
    .bind(notes)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| CommandError::Storage(e.to_string()))?;

    audit::record_in_tx(
        &mut tx,
        Some(issued_by),
        "shutdown_command_issued",
        Some(machine_id),
        Some(command.id),
        serde_json::json!({
            "idle_threshold_minutes": idle_threshold_minutes,
            "notes": notes,
        }),
    )
    .await
    .map_err(|e| CommandError::Storage(e.to_string()))?;

    tx.commit().await.map_err(|e| CommandError::Storage(e.to_string()))?;

    Ok(command)
}

/// Return the one live pending command for `machine_id`, if any. Any pending
/// command whose `expires_at` has passed is transitioned to `expired` first,
/// in the same transaction, before the live lookup runs.
///
/// # Errors
///
/// Returns [`CommandError::Storage`] on database failure.
pub async fn poll_pending(pool: &PgPool, machine_id: Uuid) -> Result<Option<ShutdownCommand>, CommandError> {
    let mut tx = pool.begin().await.map_err(|e| CommandError::Storage(e.to_string()))?;

    sqlx::query(
        r"UPDATE shutdown_commands
          SET status = 'expired'
          WHERE machine_id = $1 AND status = 'pending' AND expires_at < now()",
    )
    .bind(machine_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| CommandError::Storage(e.to_string()))?;

    let pending = sqlx::query_as::<_, ShutdownCommand>(
        r"SELECT * FROM shutdown_commands
          WHERE machine_id = $1 AND status = 'pending' AND expires_at >= now()",
    )
    .bind(machine_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| CommandError::Storage(e.to_string()))?;

    tx.commit().await.map_err(|e| CommandError::Storage(e.to_string()))?;

    Ok(pending)
}

/// Reconcile the agent's report of whether it executed a shutdown command.
///
/// Idempotent: if the command is already in a terminal state (`executed` or
/// `rejected`), this is a no-op that returns the existing row unchanged —
/// re-reporting the same or a different decision never re-mutates state or
/// writes a second audit entry.
///
/// # Errors
///
/// Returns [`CommandError::CommandNotFound`] if no such command exists, or
/// [`CommandError::MachineMismatch`] if it belongs to a different machine.
pub async fn report_result(
    pool: &PgPool,
    machine_id: Uuid,
    command_id: Uuid,
    executed: bool,
    reason: Option<&str>,
) -> Result<ShutdownCommand, CommandError> {
    let mut tx = pool.begin().await.map_err(|e| CommandError::Storage(e.to_string()))?;

    let command = sqlx::query_as::<_, ShutdownCommand>("SELECT * FROM shutdown_commands WHERE id = $1 FOR UPDATE")
        .bind(command_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CommandError::Storage(e.to_string()))?
        .ok_or(CommandError::CommandNotFound)?;

    if command.machine_id != machine_id {
        return Err(CommandError::MachineMismatch);
    }

    if command.status != CommandStatus::Pending {
        // Already terminal (or expired) — a retry of the same report must
        // not re-mutate state or write a second audit entry.
        tx.commit().await.map_err(|e| CommandError::Storage(e.to_string()))?;
        return Ok(command);
    }

    let updated = if executed {
        let updated = sqlx::query_as::<_, ShutdownCommand>(
            r"UPDATE shutdown_commands SET status = 'executed', executed_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(command_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CommandError::Storage(e.to_string()))?;

        sqlx::query("UPDATE machines SET status = 'shutdown' WHERE id = $1")
            .bind(machine_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CommandError::Storage(e.to_string()))?;

        audit::record_in_tx(
            &mut tx,
            None,
            "shutdown_command_executed",
            Some(machine_id),
            Some(command_id),
            serde_json::json!({ "executed": true }),
        )
        .await
        .map_err(|e| CommandError::Storage(e.to_string()))?;

        updated
    } else {
        let updated = sqlx::query_as::<_, ShutdownCommand>(
            r"UPDATE shutdown_commands SET status = 'rejected', rejection_reason = $2 WHERE id = $1 RETURNING *",
        )
        .bind(command_id)
        .bind(reason)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CommandError::Storage(e.to_string()))?;

        audit::record_in_tx(
            &mut tx,
            None,
            "shutdown_command_rejected",
            Some(machine_id),
            Some(command_id),
            serde_json::json!({ "executed": false, "reason": reason }),
        )
        .await
        .map_err(|e| CommandError::Storage(e.to_string()))?;

        updated
    };

    tx.commit().await.map_err(|e| CommandError::Storage(e.to_string()))?;

    Ok(updated)
}
