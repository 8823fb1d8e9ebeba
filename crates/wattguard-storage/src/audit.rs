//! Audit trail repository.
//!
//! Write-only from the core's perspective — every state-changing operation
//! in the registry, telemetry, and command-dispatch components appends one
//! row here. Nothing in this crate reads them back; that's a dashboard
//! concern.

use serde_json::Value;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::StorageError;

/// Append an audit entry inside an already-open transaction, so it commits
/// atomically with the state change it describes.
///
/// # Errors
///
/// Returns [`StorageError::Internal`] on database failure.
pub async fn record_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    actor_operator_id: Option<Uuid>,
    action: &str,
    machine_id: Option<Uuid>,
    command_id: Option<Uuid>,
    detail: Value,
) -> Result<(), StorageError> {
    sqlx::query(
        r"INSERT INTO audit_entries (actor_operator_id, action, machine_id, command_id, detail)
          VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(actor_operator_id)
    .bind(action)
    .bind(machine_id)
    .bind(command_id)
    .bind(detail)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
