//! `WattGuard` server entry point.
//!
//! Loads configuration, verifies the database schema, runs idempotent admin
//! bootstrap, then starts the Axum HTTP server with graceful shutdown. A
//! background liveness reaper runs alongside the server and drains on the
//! same shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Duration as ChronoDuration;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use wattguard_server::config::ServerConfig;
use wattguard_server::rate_limit::prune_rate_limiters;
use wattguard_server::reaper::liveness_reaper;
use wattguard_server::routes::build_router;
use wattguard_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    config.validate().context("invalid server configuration")?;

    info!(bind_addr = %config.bind_addr, "WattGuard starting");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    wattguard_storage::schema::verify_schema(&pool)
        .await
        .context("database schema is not migrated")?;

    match wattguard_storage::bootstrap::ensure_admin_exists(
        &pool,
        &config.initial_admin_username,
        &config.initial_admin_password,
    )
    .await
    {
        Ok(true) => info!(username = %config.initial_admin_username, "admin account created"),
        Ok(false) => info!("admin account already present"),
        Err(e) => {
            tracing::error!(error = %e, "admin_bootstrap_failed");
            return Err(e.into());
        }
    }

    let offline_window = ChronoDuration::seconds(config.offline_window_seconds);
    let reaper_interval_secs = config.reaper_interval_seconds;

    let state = Arc::new(AppState::new(pool.clone(), config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper_handle = {
        let pool = pool.clone();
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            liveness_reaper(pool, &mut rx, reaper_interval_secs, offline_window).await;
        })
    };

    let rate_limit_prune_handle = {
        let state = Arc::clone(&state);
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            prune_rate_limiters(state, &mut rx, 300).await;
        })
    };

    let app = build_router(Arc::clone(&state));

    let listener = TcpListener::bind(state.config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", state.config.bind_addr))?;

    info!(addr = %state.config.bind_addr, "WattGuard server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await
    .context("server error")?;

    info!("waiting for background workers to stop");
    let _ = tokio::time::timeout(Duration::from_secs(10), reaper_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(10), rate_limit_prune_handle).await;

    info!("WattGuard server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}
