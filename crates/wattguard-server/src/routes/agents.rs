//! Agent-facing routes: `/api/v1/agents/*`.
//!
//! Registration is open; every other route here requires a valid agent
//! bearer token (see [`crate::middleware::agent_auth`]).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wattguard_core::domain::Machine;
use wattguard_core::error::TelemetryError;
use wattguard_core::fingerprint::Fingerprint;
use wattguard_storage::commands;
use wattguard_storage::machines::{self, RegistrationOutcome};

use crate::error::AppError;
use crate::state::AppState;

/// Build the `/api/v1/agents` router. Only `/register` should be mounted
/// without agent-auth; the caller nests the rest behind it.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/register", post(register))
}

/// Build the agent-bearer-gated subset of `/api/v1/agents`.
pub fn authenticated_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/heartbeat", post(heartbeat))
        .route("/commands/poll", get(poll_command))
        .route("/commands/result", post(report_result))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    fingerprint: String,
    hostname: String,
    os_type: String,
    os_version: Option<String>,
    agent_version: Option<String>,
    ip: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    machine_id: Uuid,
    token: String,
    message: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let fingerprint = Fingerprint::parse(&body.fingerprint).map_err(wattguard_core::error::RegistryError::from)?;

    let (machine, raw_token, outcome) = machines::register(
        &state.pool,
        fingerprint.as_str(),
        &body.hostname,
        &body.os_type,
        body.os_version.as_deref(),
        body.ip.as_deref(),
        body.agent_version.as_deref(),
    )
    .await?;

    let message = match outcome {
        RegistrationOutcome::New => {
            tracing::info!(machine_id = %machine.id, fingerprint = %fingerprint, "agent_registered");
            "registered"
        }
        RegistrationOutcome::ReRegistered => {
            tracing::info!(machine_id = %machine.id, fingerprint = %fingerprint, "agent_re_registered");
            "re-registered"
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            machine_id: machine.id,
            token: raw_token,
            message: message.to_owned(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct HeartbeatRequest {
    idle_seconds: i64,
    cpu_usage: Option<f64>,
    memory_usage: Option<f64>,
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ip: Option<String>,
}

#[derive(Debug, Serialize)]
struct HeartbeatResponse {
    status: &'static str,
    machine_status: &'static str,
    energy_wasted_kwh: f64,
    has_pending_command: bool,
    command_id: Option<Uuid>,
}

fn validate_heartbeat(body: &HeartbeatRequest) -> Result<(), TelemetryError> {
    if !(0..=86_400).contains(&body.idle_seconds) {
        return Err(TelemetryError::IdleSecondsOutOfRange(body.idle_seconds));
    }
    if let Some(cpu) = body.cpu_usage {
        if !(0.0..=100.0).contains(&cpu) {
            return Err(TelemetryError::PercentOutOfRange { field: "cpu_usage", value: cpu });
        }
    }
    if let Some(mem) = body.memory_usage {
        if !(0.0..=100.0).contains(&mem) {
            return Err(TelemetryError::PercentOutOfRange { field: "memory_usage", value: mem });
        }
    }
    Ok(())
}

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Extension(machine): Extension<Machine>,
    Json(body): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, AppError> {
    validate_heartbeat(&body)?;

    let params = state.config.energy_params();
    let result = wattguard_storage::heartbeats::ingest(
        &state.pool,
        machine.id,
        body.idle_seconds,
        body.cpu_usage,
        body.memory_usage,
        body.ip.as_deref(),
        body.timestamp,
        &params,
    )
    .await?;

    let pending = commands::poll_pending(&state.pool, machine.id).await?;

    let machine_status = if result.delta.is_idle { "idle" } else { "online" };

    Ok(Json(HeartbeatResponse {
        status: "ok",
        machine_status,
        energy_wasted_kwh: result.machine.energy_wasted_kwh,
        has_pending_command: pending.is_some(),
        command_id: pending.map(|c| c.id),
    }))
}

#[derive(Debug, Serialize)]
struct PollResponse {
    has_command: bool,
    command_id: Option<Uuid>,
    command_type: Option<&'static str>,
    idle_threshold_minutes: Option<i32>,
}

async fn poll_command(
    State(state): State<Arc<AppState>>,
    Extension(machine): Extension<Machine>,
) -> Result<Json<PollResponse>, AppError> {
    let pending = commands::poll_pending(&state.pool, machine.id).await?;

    Ok(Json(match pending {
        Some(command) => PollResponse {
            has_command: true,
            command_id: Some(command.id),
            command_type: Some("shutdown"),
            idle_threshold_minutes: Some(command.idle_threshold_minutes),
        },
        None => PollResponse {
            has_command: false,
            command_id: None,
            command_type: None,
            idle_threshold_minutes: None,
        },
    }))
}

#[derive(Debug, Deserialize)]
struct CommandResultRequest {
    command_id: Uuid,
    executed: bool,
    reason: Option<String>,
    #[serde(rename = "idle_minutes_at_execution")]
    _idle_minutes_at_execution: Option<i32>,
}

async fn report_result(
    State(state): State<Arc<AppState>>,
    Extension(machine): Extension<Machine>,
    Json(body): Json<CommandResultRequest>,
) -> Result<StatusCode, AppError> {
    commands::report_result(
        &state.pool,
        machine.id,
        body.command_id,
        body.executed,
        body.reason.as_deref(),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
