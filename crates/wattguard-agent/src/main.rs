//! `WattGuard` agent entry point.
//!
//! One process per monitored host. Registers (or re-registers) with the
//! control plane, then runs the heartbeat/command-poll loop until a signal
//! asks it to stop.

mod agent;
mod client;
mod config;
mod fsutil;
mod probes;
mod queue;
mod shutdown;
mod sysinfo;

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;

use agent::Agent;
use config::AgentConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AgentConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln_startup_failure(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = if config.debug { "debug" } else { config.log_level.as_str() };
                tracing_subscriber::EnvFilter::new(level)
            }),
        )
        .json()
        .init();

    tracing::info!(server = %config.server_url, "WattGuard agent starting");

    let probe: Arc<dyn probes::Probe> = Arc::from(probes::select());
    let mut agent = match Agent::new(config.clone(), probe) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(error = %e, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = agent.ensure_registered().await {
        tracing::error!(error = %e, "cannot start without registration");
        return ExitCode::FAILURE;
    }

    if config.register_only {
        tracing::info!("registration complete, exiting (--register-only)");
        return ExitCode::SUCCESS;
    }

    let (tx, mut rx) = watch::channel(false);
    tokio::spawn(shutdown_signal(tx));

    agent.run(&mut rx).await;

    tracing::info!("WattGuard agent stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal(tx: watch::Sender<bool>) {
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

    let _ = tx.send(true);
}

/// The config/tracing layers aren't initialized yet if `AgentConfig::load`
/// itself fails, so this one diagnostic goes straight to stderr.
#[allow(clippy::print_stderr)]
fn eprintln_startup_failure(message: &str) {
    eprintln!("wattguard-agent: {message}");
}
