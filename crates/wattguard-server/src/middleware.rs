//! Authentication middleware for the `WattGuard` server.
//!
//! Two independent auth schemes share this HTTP surface: dashboard operators
//! present a JWT bearer access token, and agents present an opaque bearer
//! token minted at registration. Each gets its own middleware and its own
//! request-extension type so a handler only ever extracts the identity its
//! route actually expects.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;
use wattguard_core::credential::hash_token;
use wattguard_core::domain::Role;
use wattguard_core::session::decode_access_token;
use wattguard_storage::machines::find_by_agent_token;

use crate::state::AppState;

/// Operator identity injected into request extensions by [`operator_auth`].
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub operator_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl OperatorContext {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn unauthorized(message: &str) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({"error": "unauthorized", "message": message})),
    )
        .into_response();
    response.headers_mut().insert(
        axum::http::header::WWW_AUTHENTICATE,
        axum::http::HeaderValue::from_static("Bearer"),
    );
    response
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Agent routes accept either a standard bearer token or `X-API-Key`, so an
/// agent can present whichever its HTTP client makes more convenient.
fn agent_token(req: &Request) -> Option<&str> {
    bearer_token(req).or_else(|| {
        req.headers()
            .get("X-API-Key")
            .and_then(|v| v.to_str().ok())
    })
}

/// Require a valid operator access token. Injects [`OperatorContext`] on
/// success.
pub async fn operator_auth(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(&req) else {
        return unauthorized("missing bearer token");
    };

    match decode_access_token(token, state.config.jwt_secret.as_bytes()) {
        Ok(claims) => {
            req.extensions_mut().insert(OperatorContext {
                operator_id: claims.sub,
                username: claims.username,
                role: claims.role,
            });
            next.run(req).await
        }
        Err(_) => unauthorized("invalid or expired access token"),
    }
}

/// Require a valid, non-revoked agent bearer token. Injects the authenticated
/// [`Machine`] on success.
pub async fn agent_auth(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let Some(token) = agent_token(&req) else {
        return unauthorized("missing bearer token");
    };

    let token_hash = hash_token(token);

    match find_by_agent_token(&state.pool, &token_hash).await {
        Ok(machine) => {
            req.extensions_mut().insert(machine);
            next.run(req).await
        }
        Err(_) => unauthorized("invalid or revoked agent token"),
    }
}

/// Require the authenticated operator (already validated by [`operator_auth`])
/// to hold the admin role.
pub async fn require_admin(req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<OperatorContext>() else {
        return unauthorized("missing operator context");
    };

    if !ctx.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            axum::Json(serde_json::json!({"error": "forbidden", "message": "admin role required"})),
        )
            .into_response();
    }

    next.run(req).await
}
