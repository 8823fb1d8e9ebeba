//! Operator session routes: `/api/v1/auth/*`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use wattguard_core::credential::{generate_refresh_token, hash_token, needs_rehash, timing_dummy_verify, verify_password};
use wattguard_core::domain::Role;
use wattguard_core::session::issue_access_token;
use wattguard_storage::{operators, refresh_tokens};

use crate::error::AppError;
use crate::middleware::OperatorContext;
use crate::state::AppState;

/// Build the open `/api/v1/auth` routes (`login`, `refresh`). The caller
/// attaches the stricter login rate-limit middleware to this router.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

/// Build the operator-bearer-gated `/api/v1/auth` routes (`logout`). The
/// caller nests this behind [`crate::middleware::operator_auth`].
pub fn authenticated_router() -> Router<Arc<AppState>> {
    Router::new().route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    expires_at: chrono::DateTime<Utc>,
    role: Role,
    username: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let username = body.username.trim().to_lowercase();

    let Some(operator) = operators::find_by_username(&state.pool, &username).await? else {
        timing_dummy_verify();
        return Err(AppError::Unauthorized("invalid username or password".to_owned()));
    };

    if !operator.is_active {
        timing_dummy_verify();
        return Err(AppError::Unauthorized("invalid username or password".to_owned()));
    }

    if let Some(locked_until) = operator.locked_until {
        if locked_until > Utc::now() {
            let wait = (locked_until - Utc::now()).num_seconds().max(0);
            return Err(AppError::RateLimited(format!(
                "account locked; try again in {wait}s"
            )));
        }
    }

    if !verify_password(&body.password, &operator.password_hash) {
        operators::record_login_failure(
            &state.pool,
            operator.id,
            state.config.login_lockout_threshold,
            Duration::minutes(state.config.login_lockout_minutes),
        )
        .await?;
        tracing::warn!(username = %username, "login failed: wrong password");
        return Err(AppError::Unauthorized("invalid username or password".to_owned()));
    }

    let rehashed = if needs_rehash(&operator.password_hash) {
        Some(wattguard_core::credential::hash_password(&body.password)?)
    } else {
        None
    };

    let operator = operators::record_login_success(&state.pool, operator.id, rehashed.as_deref()).await?;

    let (access_token, expires_at) = issue_access_token(
        operator.id,
        &operator.username,
        operator.role,
        state.config.jwt_secret.as_bytes(),
        Duration::minutes(state.config.access_token_ttl_minutes),
    )?;

    let (raw_refresh, refresh_hash) = generate_refresh_token();
    let refresh_expires_at = Utc::now() + Duration::days(state.config.refresh_token_ttl_days);

    refresh_tokens::create(&state.pool, operator.id, &refresh_hash, refresh_expires_at, None, None).await?;

    tracing::info!(username = %operator.username, "operator logged in");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token: raw_refresh,
        expires_at,
        role: operator.role,
        username: operator.username,
    }))
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    access_token: String,
    expires_at: chrono::DateTime<Utc>,
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let token_hash = hash_token(&body.refresh_token);

    let Some(stored) = refresh_tokens::find_by_hash(&state.pool, &token_hash).await? else {
        return Err(AppError::Unauthorized("invalid refresh token".to_owned()));
    };

    if stored.revoked || stored.expires_at <= Utc::now() {
        return Err(AppError::Unauthorized("refresh token is revoked or expired".to_owned()));
    }

    let operator = operators::find_by_id(&state.pool, stored.operator_id).await?;
    if !operator.is_active {
        return Err(AppError::Unauthorized("operator account is inactive".to_owned()));
    }

    let mut tx = state.pool.begin().await.map_err(wattguard_storage::error::StorageError::from)?;
    refresh_tokens::revoke_in_tx(&mut tx, stored.id).await?;
    tx.commit().await.map_err(wattguard_storage::error::StorageError::from)?;

    let (access_token, expires_at) = issue_access_token(
        operator.id,
        &operator.username,
        operator.role,
        state.config.jwt_secret.as_bytes(),
        Duration::minutes(state.config.access_token_ttl_minutes),
    )?;

    Ok(Json(RefreshResponse { access_token, expires_at }))
}

#[derive(Debug, Deserialize)]
struct LogoutRequest {
    refresh_token: String,
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<OperatorContext>,
    Json(body): Json<LogoutRequest>,
) -> Result<StatusCode, AppError> {
    let token_hash = hash_token(&body.refresh_token);
    refresh_tokens::revoke_if_owned(&state.pool, &token_hash, ctx.operator_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
