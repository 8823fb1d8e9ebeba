//! Server configuration for `WattGuard`.
//!
//! Loads from environment variables with sensible defaults, matching the
//! original system's `Settings` object one knob-for-knob. [`ServerConfig::validate`]
//! is run once at startup, before the listener binds, so a misconfigured
//! production deployment fails loudly instead of serving traffic insecurely.

use std::net::SocketAddr;

use wattguard_core::energy::EnergyParams;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Runtime environment — affects which misconfigurations are fatal.
    pub environment: Environment,
    /// Log filter (e.g. `info`, `debug`, `warn`).
    pub log_level: String,

    /// HMAC signing secret for access tokens.
    pub jwt_secret: String,
    /// Access token lifetime, in minutes.
    pub access_token_ttl_minutes: i64,
    /// Refresh token lifetime, in days.
    pub refresh_token_ttl_days: i64,

    /// Username of the bootstrap admin account.
    pub initial_admin_username: String,
    /// Password of the bootstrap admin account. Empty means "fail fast if no
    /// admin exists yet" — this system never auto-generates one.
    pub initial_admin_password: String,

    /// Failed-login threshold before an account is locked out.
    pub login_lockout_threshold: i32,
    /// Lockout duration, in minutes, once the threshold is reached.
    pub login_lockout_minutes: i64,

    /// Seconds of reported idle time at/above which a machine is classified idle.
    pub idle_threshold_seconds: i64,
    /// Expected seconds between agent heartbeats; caps the energy credited
    /// to any single heartbeat.
    pub heartbeat_interval_seconds: i64,
    /// Seconds since last heartbeat after which the reaper marks a machine offline.
    pub offline_window_seconds: i64,
    /// Interval between liveness-reaper ticks, in seconds.
    pub reaper_interval_seconds: u64,
    /// Lifetime of an issued shutdown command before it auto-expires.
    pub shutdown_command_ttl_seconds: i64,

    /// Declared idle power draw used for the energy accounting model.
    pub idle_power_watts: f64,
    /// Electricity price used to convert energy into cost.
    pub cost_per_kwh: f64,
    /// Grid carbon intensity used to convert energy into CO₂.
    pub co2_kg_per_kwh: f64,

    /// General rate-limit bucket: requests allowed per window.
    pub rate_limit_requests: u32,
    /// General rate-limit bucket: window length, in seconds.
    pub rate_limit_window_secs: u64,
    /// Login rate-limit bucket: requests allowed per window.
    pub login_rate_limit_requests: u32,
    /// Login rate-limit bucket: window length, in seconds.
    pub login_rate_limit_window_secs: u64,
}

/// Distinguishes which misconfigurations are merely warned about versus fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables (all prefixed implicitly by convention with the
    /// original system's names, unprefixed since this is a single-service
    /// deployment): `PORT`/`BIND_ADDR`, `DATABASE_URL`, `ENVIRONMENT`
    /// (`development`|`production`), `LOG_LEVEL`, `JWT_SECRET_KEY`,
    /// `ACCESS_TOKEN_EXPIRE_MINUTES`, `REFRESH_TOKEN_EXPIRE_DAYS`,
    /// `INITIAL_ADMIN_USERNAME`, `INITIAL_ADMIN_PASSWORD`,
    /// `LOGIN_LOCKOUT_THRESHOLD`, `LOGIN_LOCKOUT_MINUTES`,
    /// `IDLE_THRESHOLD_SECONDS`, `HEARTBEAT_INTERVAL_SECONDS`,
    /// `OFFLINE_THRESHOLD_SECONDS`, `REAPER_INTERVAL_SECONDS`,
    /// `SHUTDOWN_COMMAND_TTL_SECONDS`, `IDLE_POWER_WATTS`,
    /// `ELECTRICITY_COST_PER_KWH`, `CO2_KG_PER_KWH`, `RATE_LIMIT_REQUESTS`,
    /// `RATE_LIMIT_WINDOW_SECONDS`, `LOGIN_RATE_LIMIT_REQUESTS`,
    /// `LOGIN_RATE_LIMIT_WINDOW_SECONDS`.
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr = if let Ok(addr) = std::env::var("BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8000)))
        } else if let Ok(port_str) = std::env::var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(8000);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], 8000))
        };

        let environment = match std::env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_owned())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        Self {
            bind_addr,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/wattguard".to_owned()),
            environment,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),

            jwt_secret: std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| "dev-only-insecure-secret".to_owned()),
            access_token_ttl_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES", 60),
            refresh_token_ttl_days: env_parse("REFRESH_TOKEN_EXPIRE_DAYS", 30),

            initial_admin_username: std::env::var("INITIAL_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_owned()),
            initial_admin_password: std::env::var("INITIAL_ADMIN_PASSWORD").unwrap_or_default(),

            login_lockout_threshold: env_parse("LOGIN_LOCKOUT_THRESHOLD", 10),
            login_lockout_minutes: env_parse("LOGIN_LOCKOUT_MINUTES", 15),

            idle_threshold_seconds: env_parse("IDLE_THRESHOLD_SECONDS", 300),
            heartbeat_interval_seconds: env_parse("HEARTBEAT_INTERVAL_SECONDS", 60),
            offline_window_seconds: env_parse("OFFLINE_THRESHOLD_SECONDS", 180),
            reaper_interval_seconds: env_parse("REAPER_INTERVAL_SECONDS", 300),
            shutdown_command_ttl_seconds: env_parse("SHUTDOWN_COMMAND_TTL_SECONDS", 120),

            idle_power_watts: env_parse("IDLE_POWER_WATTS", 65.0),
            cost_per_kwh: env_parse("ELECTRICITY_COST_PER_KWH", 0.12),
            co2_kg_per_kwh: env_parse("CO2_KG_PER_KWH", 0.386),

            rate_limit_requests: env_parse("RATE_LIMIT_REQUESTS", 100),
            rate_limit_window_secs: env_parse("RATE_LIMIT_WINDOW_SECONDS", 60),
            login_rate_limit_requests: env_parse("LOGIN_RATE_LIMIT_REQUESTS", 10),
            login_rate_limit_window_secs: env_parse("LOGIN_RATE_LIMIT_WINDOW_SECONDS", 300),
        }
    }

    /// Energy-accounting parameters derived from this configuration.
    #[must_use]
    pub fn energy_params(&self) -> EnergyParams {
        EnergyParams {
            idle_power_watts: self.idle_power_watts,
            cost_per_kwh: self.cost_per_kwh,
            co2_kg_per_kwh: self.co2_kg_per_kwh,
            idle_threshold_seconds: self.idle_threshold_seconds,
            heartbeat_interval_seconds: self.heartbeat_interval_seconds,
        }
    }

    /// Validate production-time requirements.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first fatal misconfiguration found:
    /// a JWT signing secret under 32 characters, or a missing/empty initial
    /// admin password — in production these are never acceptable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.environment == Environment::Production {
            anyhow::ensure!(
                self.jwt_secret.len() >= 32,
                "JWT_SECRET_KEY must be at least 32 characters in production"
            );
            anyhow::ensure!(
                !self.initial_admin_password.is_empty(),
                "INITIAL_ADMIN_PASSWORD must be set in production"
            );
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
