//! Machine directory routes: `/api/v1/machines/*`.
//!
//! Read paths are available to any authenticated operator; the two write
//! paths (`PATCH`, `revoke-token`) additionally require the admin role.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wattguard_core::domain::{Machine, MachineStatus};
use wattguard_storage::{heartbeats, machines};

use crate::error::AppError;
use crate::state::AppState;

/// Build the read-only subset of `/api/v1/machines`, available to any
/// authenticated operator.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_machines))
        .route("/{id}", get(get_machine))
        .route("/{id}/heartbeats", get(get_machine_heartbeats))
}

/// Build the admin-only write subset of `/api/v1/machines`. The caller nests
/// this behind the admin-role middleware.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}", patch(update_machine))
        .route("/{id}/revoke-token", post(revoke_token))
}

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    search: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_machines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Machine>>, AppError> {
    let status = match query.status {
        Some(raw) => Some(parse_status(&raw)?),
        None => None,
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let machines = machines::list(&state.pool, status, query.search.as_deref(), limit, offset).await?;
    Ok(Json(machines))
}

fn parse_status(raw: &str) -> Result<MachineStatus, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "online" => Ok(MachineStatus::Online),
        "idle" => Ok(MachineStatus::Idle),
        "offline" => Ok(MachineStatus::Offline),
        "shutdown" => Ok(MachineStatus::Shutdown),
        other => Err(AppError::BadRequest(format!("invalid status filter '{other}'"))),
    }
}

async fn get_machine(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Machine>, AppError> {
    let machine = machines::get(&state.pool, id).await?;
    Ok(Json(machine))
}

#[derive(Debug, Deserialize)]
struct HeartbeatsQuery {
    limit: Option<i64>,
}

async fn get_machine_heartbeats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<HeartbeatsQuery>,
) -> Result<Json<Vec<wattguard_core::domain::Heartbeat>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 1000);
    let rows = heartbeats::recent_for_machine(&state.pool, id, limit).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct UpdateMachineRequest {
    notes: Option<String>,
    hostname: Option<String>,
}

async fn update_machine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMachineRequest>,
) -> Result<Json<Machine>, AppError> {
    let machine = machines::patch(&state.pool, id, body.notes.as_deref(), body.hostname.as_deref()).await?;
    Ok(Json(machine))
}

#[derive(Debug, Serialize)]
struct RevokeTokenResponse {
    revoked: bool,
}

async fn revoke_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RevokeTokenResponse>), AppError> {
    machines::revoke_agent_token(&state.pool, id).await?;
    Ok((StatusCode::OK, Json(RevokeTokenResponse { revoked: true })))
}
