//! Agent configuration: CLI flags, environment, an on-disk JSON file, and
//! built-in defaults, layered in that priority order.
//!
//! `server_url`, `debug`, and `register_only` can be set from the command
//! line (matching the original agent's `argparse` front door); every other
//! recognized option is environment-or-file-or-default only. `agent_token`
//! and `machine_id` are persisted back to the config file once registration
//! succeeds, so a restarted agent skips re-registration.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

const DEFAULT_HEARTBEAT_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_IDLE_THRESHOLD_SECONDS: u64 = 300;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_SECONDS: u64 = 10;
const DEFAULT_OFFLINE_QUEUE_MAX: usize = 100;

/// `wattguard-agent` — device daemon: reports telemetry, executes idle-only
/// remote shutdown commands with local re-validation.
#[derive(Debug, Parser)]
#[command(name = "wattguard-agent", version, about)]
struct Cli {
    /// WattGuard server URL (e.g. `https://wattguard.example.com`).
    #[arg(long, env = "GREENOPS_SERVER_URL")]
    server: Option<String>,

    /// Enable debug logging.
    #[arg(long, env = "GREENOPS_DEBUG")]
    debug: bool,

    /// Register with the server and exit without starting the main loop.
    #[arg(long, env = "GREENOPS_REGISTER_ONLY")]
    register_only: bool,

    /// Override the config file path (default: `~/.greenops/agent.json`).
    #[arg(long)]
    config_file: Option<PathBuf>,
}

/// The subset of configuration that is read from and written back to the
/// on-disk config file. All fields are optional so a partial or missing file
/// never blocks startup — unset fields fall through to defaults.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PersistedConfig {
    server_url: Option<String>,
    heartbeat_interval_seconds: Option<u64>,
    idle_threshold_seconds: Option<u64>,
    log_level: Option<String>,
    retry_max_attempts: Option<u32>,
    retry_base_delay_seconds: Option<u64>,
    offline_queue_max: Option<usize>,
    agent_token: Option<String>,
    machine_id: Option<String>,
}

/// Fully resolved agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub server_url: String,
    pub debug: bool,
    pub register_only: bool,
    pub heartbeat_interval_seconds: u64,
    pub idle_threshold_seconds: u64,
    pub log_level: String,
    pub retry_max_attempts: u32,
    pub retry_base_delay_seconds: u64,
    pub offline_queue_max: usize,
    pub agent_token: Option<String>,
    pub machine_id: Option<String>,
    pub config_path: PathBuf,
    pub queue_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no server URL given: pass --server, set GREENOPS_SERVER_URL, or put server_url in the config file")]
    MissingServerUrl,
    #[error("failed to determine home directory")]
    NoHomeDir,
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("config file {path} is not valid JSON: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("failed to write config file {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

fn default_base_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .ok_or(ConfigError::NoHomeDir)?;
    Ok(PathBuf::from(home).join(".greenops"))
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn load_persisted(path: &Path) -> Result<PersistedConfig, ConfigError> {
    if !path.exists() {
        return Ok(PersistedConfig::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    crate::fsutil::write_atomic(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_owned(),
        source,
    })
}

impl AgentConfig {
    /// Resolve configuration from CLI flags, the environment, the on-disk
    /// config file, and built-in defaults, in that priority order.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = Cli::parse();

        let base_dir = default_base_dir()?;
        let config_path = cli.config_file.clone().unwrap_or_else(|| base_dir.join("agent.json"));
        let queue_path = config_path
            .parent()
            .map(|p| p.join("queue.json"))
            .unwrap_or_else(|| base_dir.join("queue.json"));

        let file = load_persisted(&config_path)?;

        let server_url = cli
            .server
            .or_else(|| file.server_url.clone())
            .ok_or(ConfigError::MissingServerUrl)?;

        Ok(Self {
            server_url,
            debug: cli.debug,
            register_only: cli.register_only,
            heartbeat_interval_seconds: env_u64("GREENOPS_HEARTBEAT_INTERVAL")
                .or(file.heartbeat_interval_seconds)
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECONDS),
            idle_threshold_seconds: env_u64("GREENOPS_IDLE_THRESHOLD")
                .or(file.idle_threshold_seconds)
                .unwrap_or(DEFAULT_IDLE_THRESHOLD_SECONDS),
            log_level: std::env::var("GREENOPS_LOG_LEVEL")
                .ok()
                .or(file.log_level.clone())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
            retry_max_attempts: env_u32("GREENOPS_RETRY_MAX_ATTEMPTS")
                .or(file.retry_max_attempts)
                .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS),
            retry_base_delay_seconds: env_u64("GREENOPS_RETRY_BASE_DELAY")
                .or(file.retry_base_delay_seconds)
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_SECONDS),
            offline_queue_max: env_usize("GREENOPS_OFFLINE_QUEUE_MAX")
                .or(file.offline_queue_max)
                .unwrap_or(DEFAULT_OFFLINE_QUEUE_MAX),
            agent_token: file.agent_token,
            machine_id: file.machine_id,
            config_path,
            queue_path,
        })
    }

    /// Persist the registration outcome (token + machine id) to the config
    /// file, preserving whatever other keys were already there.
    pub fn persist_registration(&mut self, machine_id: &str, token: &str) -> Result<(), ConfigError> {
        let mut file = load_persisted(&self.config_path)?;
        file.server_url = Some(self.server_url.clone());
        file.machine_id = Some(machine_id.to_owned());
        file.agent_token = Some(token.to_owned());

        let serialized = serde_json::to_string_pretty(&file).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })?;
        write_atomic(&self.config_path, &serialized)?;

        self.machine_id = Some(machine_id.to_owned());
        self.agent_token = Some(token.to_owned());
        Ok(())
    }

    /// Clear persisted credentials (after a 401) so the next loop iteration
    /// re-registers from scratch.
    pub fn clear_registration(&mut self) -> Result<(), ConfigError> {
        let mut file = load_persisted(&self.config_path)?;
        file.agent_token = None;
        file.machine_id = None;

        let serialized = serde_json::to_string_pretty(&file).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })?;
        write_atomic(&self.config_path, &serialized)?;

        self.agent_token = None;
        self.machine_id = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        write_atomic(&path, "{\"a\":1}").unwrap();
        write_atomic(&path, "{\"a\":2}").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"a\":2}");
    }

    #[test]
    fn load_persisted_on_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let cfg = load_persisted(&path).unwrap();
        assert!(cfg.server_url.is_none());
    }

    #[test]
    fn load_persisted_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_persisted(&path).is_err());
    }
}
