//! Shared application state for the `WattGuard` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::rate_limit::{RateLimiter, RateLimiters};

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// The PostgreSQL connection pool.
    pub pool: PgPool,
    /// Server configuration, including the energy-accounting and
    /// liveness-window parameters every component reads.
    pub config: ServerConfig,
    /// Per-IP request-rate buckets.
    pub rate_limiters: RateLimiters,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: ServerConfig) -> Self {
        let rate_limiters = RateLimiters {
            general: RateLimiter::new(
                config.rate_limit_requests,
                std::time::Duration::from_secs(config.rate_limit_window_secs),
            ),
            login: RateLimiter::new(
                config.login_rate_limit_requests,
                std::time::Duration::from_secs(config.login_rate_limit_window_secs),
            ),
        };

        Self {
            pool,
            config,
            rate_limiters,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
