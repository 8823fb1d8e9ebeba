//! HTTP control plane for `WattGuard`.
//!
//! Wires `wattguard-core`'s domain logic and `wattguard-storage`'s
//! repositories into an Axum application: operator sessions, the machine
//! registry, telemetry ingestion, shutdown-command dispatch, and the
//! liveness reaper.

pub mod config;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod reaper;
pub mod routes;
pub mod state;
