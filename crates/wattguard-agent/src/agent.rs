//! Main agent loop: registration, heartbeats, command polling, and the
//! offline queue. Orchestrates the other modules; doesn't talk to the wire
//! or the filesystem directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;

use wattguard_core::fingerprint::Fingerprint;

use crate::client::{ClientError, CommandResultRequest, GreenOpsClient, HeartbeatRequest, RegisterRequest};
use crate::config::AgentConfig;
use crate::probes::Probe;
use crate::queue::OfflineQueue;
use crate::shutdown::perform_shutdown;

const COMMAND_POLL_INTERVAL: Duration = Duration::from_secs(30);
const SHUTDOWN_REPORT_GRACE: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(300);
const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("registration rejected by server: {0}")]
    RegistrationRejected(String),
    #[error("registration failed after retrying: {0}")]
    RegistrationExhausted(ClientError),
    #[error("no stable MAC address could be determined")]
    NoFingerprint,
}

pub struct Agent {
    config: AgentConfig,
    client: GreenOpsClient,
    probe: Arc<dyn Probe>,
    queue: OfflineQueue,
}

impl Agent {
    pub fn new(config: AgentConfig, probe: Arc<dyn Probe>) -> Result<Self, ClientError> {
        let client = GreenOpsClient::new(&config.server_url, config.agent_token.clone())?;
        let queue = OfflineQueue::load(config.queue_path.clone(), config.offline_queue_max);
        Ok(Self { config, client, probe, queue })
    }

    /// Register with the server if no credentials are persisted yet.
    /// Returns early with `Ok(())` if already registered.
    pub async fn ensure_registered(&mut self) -> Result<(), AgentError> {
        if self.config.agent_token.is_some() && self.config.machine_id.is_some() {
            return Ok(());
        }
        self.register_with_retry().await
    }

    async fn register_with_retry(&mut self) -> Result<(), AgentError> {
        let raw_mac = crate::sysinfo::mac_address().ok_or(AgentError::NoFingerprint)?;
        let fingerprint = Fingerprint::parse(&raw_mac).map_err(|_| AgentError::NoFingerprint)?;
        let fingerprint = fingerprint.as_str();
        let hostname = crate::sysinfo::hostname();
        let os_type = crate::sysinfo::os_type();
        let os_version = crate::sysinfo::os_version();
        let ip = crate::sysinfo::primary_ip();

        let req = RegisterRequest {
            fingerprint,
            hostname: &hostname,
            os_type,
            os_version,
            agent_version: AGENT_VERSION,
            ip,
        };

        let mut attempt = 0u32;
        loop {
            match self.client.register(&req).await {
                Ok(resp) => {
                    self.config
                        .persist_registration(&resp.machine_id, &resp.token)
                        .map_err(|e| AgentError::RegistrationExhausted(ClientError::Rejected {
                            status: 0,
                            body: e.to_string(),
                        }))?;
                    self.client.set_token(resp.token);
                    tracing::info!(machine_id = %resp.machine_id, "registered with WattGuard server");
                    return Ok(());
                }
                Err(ClientError::Rejected { status, body }) => {
                    return Err(AgentError::RegistrationRejected(format!("{status}: {body}")));
                }
                Err(e) if attempt.saturating_add(1) >= self.config.retry_max_attempts => {
                    return Err(AgentError::RegistrationExhausted(e));
                }
                Err(e) => {
                    let delay = backoff_delay(self.config.retry_base_delay_seconds, attempt);
                    tracing::warn!(error = %e, attempt, delay_secs = delay.as_secs(), "registration failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run the heartbeat/command-poll loop until `shutdown` fires.
    pub async fn run(&mut self, shutdown: &mut watch::Receiver<bool>) {
        let mut heartbeat_tick = interval(Duration::from_secs(self.config.heartbeat_interval_seconds));
        let mut command_tick = interval(COMMAND_POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = heartbeat_tick.tick() => {
                    self.do_heartbeat().await;
                }
                _ = command_tick.tick() => {
                    self.do_command_poll().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("agent stopping");
                        let _ = self.queue.save();
                        return;
                    }
                }
            }
        }
    }

    async fn do_heartbeat(&mut self) {
        let sample = self.sample().await;
        let request = HeartbeatRequest {
            idle_seconds: sample.idle_seconds,
            cpu_usage: sample.cpu_usage,
            memory_usage: sample.memory_usage,
            timestamp: Some(Utc::now()),
            ip: crate::sysinfo::primary_ip(),
        };

        match self.client.heartbeat(&request).await {
            Ok(resp) => {
                tracing::debug!(idle_seconds = sample.idle_seconds, "heartbeat sent");
                if resp.has_pending_command {
                    self.do_command_poll().await;
                }
                self.drain_offline_queue().await;
            }
            Err(ClientError::Unauthorized) => {
                self.handle_unauthorized().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "heartbeat failed, enqueuing for later");
                if let Err(io_err) = self.queue.push(request) {
                    tracing::error!(error = %io_err, "failed to persist offline queue");
                }
            }
        }
    }

    async fn drain_offline_queue(&mut self) {
        while let Some(queued) = self.queue.pop_front() {
            match self.client.heartbeat(&queued.request).await {
                Ok(_) => {
                    let _ = self.queue.save();
                }
                Err(ClientError::Unauthorized) => {
                    self.handle_unauthorized().await;
                    let _ = self.queue.push(queued.request);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "offline queue drain failed, re-enqueuing");
                    let _ = self.queue.push(queued.request);
                    break;
                }
            }
        }
    }

    async fn do_command_poll(&mut self) {
        match self.client.poll_command().await {
            Ok(resp) if resp.has_command => {
                self.handle_command(resp).await;
            }
            Ok(_) => {}
            Err(ClientError::Unauthorized) => {
                self.handle_unauthorized().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "command poll failed");
            }
        }
    }

    async fn handle_command(&mut self, cmd: crate::client::PollResponse) {
        let Some(command_id) = cmd.command_id else {
            return;
        };
        let threshold_minutes = cmd.idle_threshold_minutes.unwrap_or(15);
        let threshold_seconds = i64::from(threshold_minutes).saturating_mul(60);

        let sample = self.sample().await;
        #[allow(clippy::cast_possible_wrap)]
        let current_idle_seconds = sample.idle_seconds as i64;
        let current_idle_minutes = current_idle_seconds / 60;

        tracing::info!(
            command_id = %command_id,
            current_idle_seconds,
            threshold_seconds,
            "received shutdown command"
        );

        if current_idle_seconds < threshold_seconds {
            let reason = format!(
                "machine not idle: current idle {current_idle_minutes}m, required {threshold_minutes}m"
            );
            tracing::warn!(%reason, "shutdown rejected");
            let _ = self
                .client
                .report_command(&CommandResultRequest {
                    command_id: &command_id,
                    executed: false,
                    reason: Some(reason),
                    idle_minutes_at_execution: Some(current_idle_minutes),
                })
                .await;
            return;
        }

        tracing::warn!(current_idle_minutes, threshold_minutes, "executing shutdown");
        let _ = self
            .client
            .report_command(&CommandResultRequest {
                command_id: &command_id,
                executed: true,
                reason: None,
                idle_minutes_at_execution: Some(current_idle_minutes),
            })
            .await;

        tokio::time::sleep(SHUTDOWN_REPORT_GRACE).await;
        perform_shutdown();
    }

    async fn handle_unauthorized(&mut self) {
        tracing::warn!("server rejected our token, clearing credentials and re-registering");
        if let Err(e) = self.config.clear_registration() {
            tracing::error!(error = %e, "failed to clear persisted credentials");
        }
        if let Err(e) = self.register_with_retry().await {
            tracing::error!(error = %e, "re-registration failed");
        }
    }

    async fn sample(&self) -> crate::probes::Sample {
        let probe = Arc::clone(&self.probe);
        tokio::task::spawn_blocking(move || probe.sample())
            .await
            .unwrap_or(crate::probes::Sample {
                idle_seconds: 0,
                cpu_usage: None,
                memory_usage: None,
            })
    }
}

fn backoff_delay(base_secs: u64, attempt: u32) -> Duration {
    let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(base_secs.saturating_mul(multiplier)).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        assert_eq!(backoff_delay(10, 0), Duration::from_secs(10));
        assert_eq!(backoff_delay(10, 1), Duration::from_secs(20));
        assert_eq!(backoff_delay(10, 2), Duration::from_secs(40));
        assert_eq!(backoff_delay(10, 10), MAX_BACKOFF);
    }
}
