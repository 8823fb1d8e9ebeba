//! HTTP route modules, one per `/api/v1/*` surface.

pub mod agents;
pub mod auth;
pub mod commands;
pub mod health;
pub mod machines;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware as axum_mw;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{agent_auth, operator_auth, require_admin};
use crate::rate_limit::{general_rate_limit, login_rate_limit};
use crate::state::AppState;

/// Assemble the full Axum router: every `/api/v1/*` route, with the right
/// auth and rate-limit middleware layered on each surface.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_public = auth::public_router()
        .route_layer(axum_mw::from_fn_with_state(Arc::clone(&state), login_rate_limit));

    let auth_authenticated = auth::authenticated_router()
        .route_layer(axum_mw::from_fn_with_state(Arc::clone(&state), operator_auth));

    let agent_registration = agents::router();

    let agent_authenticated = agents::authenticated_router()
        .route_layer(axum_mw::from_fn_with_state(Arc::clone(&state), agent_auth));

    let operator_read = machines::router()
        .route_layer(axum_mw::from_fn_with_state(Arc::clone(&state), operator_auth));

    let operator_admin = Router::new()
        .nest("/machines", machines::admin_router())
        .nest("/commands", commands::router())
        .route_layer(axum_mw::from_fn(require_admin))
        .route_layer(axum_mw::from_fn_with_state(Arc::clone(&state), operator_auth));

    let api = Router::new()
        .nest("/auth", auth_public.merge(auth_authenticated))
        .nest("/agents", agent_registration.merge(agent_authenticated))
        .nest("/machines", operator_read)
        .merge(operator_admin);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/health", health::router())
        .nest("/api/v1", api)
        .route_layer(axum_mw::from_fn_with_state(Arc::clone(&state), general_rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
