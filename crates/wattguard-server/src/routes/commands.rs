//! Shutdown-command dispatch routes: `/api/v1/commands/*`.
//!
//! Every route here requires an authenticated operator with the admin role.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wattguard_storage::commands;

use crate::error::AppError;
use crate::middleware::OperatorContext;
use crate::state::AppState;

/// Build the `/api/v1/commands` router. The caller nests this behind the
/// operator-auth and admin-role middleware.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/shutdown", post(issue_shutdown))
}

fn default_idle_threshold_minutes() -> i32 {
    15
}

#[derive(Debug, Deserialize)]
struct IssueShutdownRequest {
    machine_id: Uuid,
    #[serde(default = "default_idle_threshold_minutes")]
    idle_threshold_minutes: i32,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct IssueShutdownResponse {
    command_id: Uuid,
    machine_id: Uuid,
    status: &'static str,
    expires_at: chrono::DateTime<chrono::Utc>,
}

async fn issue_shutdown(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<OperatorContext>,
    Json(body): Json<IssueShutdownRequest>,
) -> Result<(StatusCode, Json<IssueShutdownResponse>), AppError> {
    let command = commands::issue(
        &state.pool,
        body.machine_id,
        ctx.operator_id,
        body.idle_threshold_minutes,
        body.notes.as_deref(),
        Duration::seconds(state.config.shutdown_command_ttl_seconds),
    )
    .await?;

    tracing::info!(
        machine_id = %body.machine_id,
        issued_by = %ctx.operator_id,
        command_id = %command.id,
        "shutdown_issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(IssueShutdownResponse {
            command_id: command.id,
            machine_id: command.machine_id,
            status: "pending",
            expires_at: command.expires_at,
        }),
    ))
}
