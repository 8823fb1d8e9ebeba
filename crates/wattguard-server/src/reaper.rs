//! Liveness reaper: periodically marks stale online/idle machines offline.
//!
//! If the database is unreachable on a tick, the scan retries with
//! exponential backoff (1s, 2s, 4s) before giving up for that tick. A
//! consecutive-failure counter escalates log severity so operators notice
//! persistent issues without being spammed on transient blips.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{info, warn};

const SCAN_MAX_RETRIES: u32 = 3;
const CONSECUTIVE_FAILURE_ESCALATION_THRESHOLD: u32 = 5;

/// Background worker that periodically marks machines whose `last_seen` has
/// fallen outside `offline_window` as offline.
pub async fn liveness_reaper(
    pool: PgPool,
    shutdown: &mut watch::Receiver<bool>,
    interval_secs: u64,
    offline_window: ChronoDuration,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    let mut consecutive_failures: u32 = 0;
    info!(interval_secs, "liveness reaper started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match retry_mark_offline(&pool, shutdown, offline_window).await {
                    Ok(None) => {
                        info!("liveness reaper shutting down");
                        return;
                    }
                    Ok(Some(count)) => {
                        consecutive_failures = 0;
                        if count > 0 {
                            info!(count, "marked stale machines offline");
                        }
                    }
                    Err(e) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        if consecutive_failures >= CONSECUTIVE_FAILURE_ESCALATION_THRESHOLD {
                            tracing::error!(
                                error = %e,
                                consecutive_failures,
                                "liveness reaper repeatedly failing"
                            );
                        } else {
                            warn!(
                                error = %e,
                                retries = SCAN_MAX_RETRIES,
                                "liveness scan failed after retries, will retry next tick"
                            );
                        }
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("liveness reaper shutting down");
                return;
            }
        }
    }
}

/// Attempt `mark_stale_offline` with exponential backoff. Returns:
/// - `Ok(Some(count))` on success
/// - `Ok(None)` if shutdown was signalled during retry
/// - `Err(last_error)` if all retries exhausted
async fn retry_mark_offline(
    pool: &PgPool,
    shutdown: &mut watch::Receiver<bool>,
    offline_window: ChronoDuration,
) -> Result<Option<u64>, String> {
    let mut last_err = String::new();

    for attempt in 0..=SCAN_MAX_RETRIES {
        match wattguard_storage::machines::mark_stale_offline(pool, offline_window).await {
            Ok(count) => return Ok(Some(count)),
            Err(e) => {
                last_err = e.to_string();

                if attempt == SCAN_MAX_RETRIES {
                    break;
                }

                let backoff = Duration::from_secs(1u64 << attempt);
                tracing::debug!(
                    attempt = attempt.saturating_add(1),
                    max = SCAN_MAX_RETRIES.saturating_add(1),
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "liveness scan failed, retrying"
                );

                tokio::select! {
                    () = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => {
                        return Ok(None);
                    }
                }
            }
        }
    }

    Err(last_err)
}
