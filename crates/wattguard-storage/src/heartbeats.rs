//! Heartbeat ingestion: the telemetry accounting transaction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use wattguard_core::domain::{Heartbeat, Machine, MachineStatus};
use wattguard_core::energy::{EnergyDelta, EnergyParams, compute_delta};
use wattguard_core::error::TelemetryError;

/// The result of applying one heartbeat: the updated machine row and the
/// history row that was appended for it.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub machine: Machine,
    pub heartbeat: Heartbeat,
    pub delta: EnergyDelta,
}

/// Apply a single heartbeat for `machine_id`: classify idle/online, compute
/// the energy/cost/CO₂ increment, update the machine's cumulative totals and
/// last-seen metadata, and append an immutable history row — all in one
/// transaction.
///
/// `idle_seconds` must already have been validated by the caller (non-
/// negative, at most one day); this function trusts its input.
///
/// # Errors
///
/// Returns [`TelemetryError::Storage`] on database failure.
#[allow(clippy::too_many_arguments)]
pub async fn ingest(
    pool: &PgPool,
    machine_id: Uuid,
    idle_seconds: i64,
    cpu_usage: Option<f64>,
    memory_usage: Option<f64>,
    ip_address: Option<&str>,
    timestamp: Option<DateTime<Utc>>,
    params: &EnergyParams,
) -> Result<IngestResult, TelemetryError> {
    let delta = compute_delta(idle_seconds, params);
    let status = if delta.is_idle { MachineStatus::Idle } else { MachineStatus::Online };
    let timestamp = timestamp.unwrap_or_else(Utc::now);

    let mut tx = pool.begin().await.map_err(|e| TelemetryError::Storage(e.to_string()))?;

    let machine = sqlx::query_as::<_, Machine>(
        r"UPDATE machines
          SET last_seen = $2,
              status = $3,
              ip_address = COALESCE($4, ip_address),
              total_idle_seconds = total_idle_seconds + $5,
              energy_wasted_kwh = energy_wasted_kwh + $6,
              energy_cost = energy_cost + $7,
              co2_kg = co2_kg + $8
          WHERE id = $1
          RETURNING *",
    )
    .bind(machine_id)
    .bind(timestamp)
    .bind(status)
    .bind(ip_address)
    .bind(idle_seconds)
    .bind(delta.energy_kwh)
    .bind(delta.cost)
    .bind(delta.co2_kg)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| TelemetryError::Storage(e.to_string()))?
    .ok_or_else(|| TelemetryError::Storage("machine not found during heartbeat ingest".to_owned()))?;

    let heartbeat = sqlx::query_as::<_, Heartbeat>(
        r"INSERT INTO heartbeats
            (machine_id, timestamp, idle_seconds, cpu_usage, memory_usage, is_idle, energy_delta_kwh, cost_delta, co2_delta_kg)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
          RETURNING *",
    )
    .bind(machine_id)
    .bind(timestamp)
    .bind(idle_seconds)
    .bind(cpu_usage)
    .bind(memory_usage)
    .bind(delta.is_idle)
    .bind(delta.energy_kwh)
    .bind(delta.cost)
    .bind(delta.co2_kg)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| TelemetryError::Storage(e.to_string()))?;

    tx.commit().await.map_err(|e| TelemetryError::Storage(e.to_string()))?;

    Ok(IngestResult { machine, heartbeat, delta })
}

/// Fetch the most recent heartbeat history rows for a machine, newest first.
///
/// # Errors
///
/// Returns [`TelemetryError::Storage`] on database failure.
pub async fn recent_for_machine(
    pool: &PgPool,
    machine_id: Uuid,
    limit: i64,
) -> Result<Vec<Heartbeat>, TelemetryError> {
    sqlx::query_as::<_, Heartbeat>(
        "SELECT * FROM heartbeats WHERE machine_id = $1 ORDER BY timestamp DESC LIMIT $2",
    )
    .bind(machine_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| TelemetryError::Storage(e.to_string()))
}
