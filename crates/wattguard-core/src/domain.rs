//! Shared domain entities.
//!
//! These types are the row shapes persisted by `wattguard-storage` and the
//! shapes returned over the wire by `wattguard-server`. Ids are UUIDv4
//! throughout — the source system this is modeled on had two overlapping
//! iterations, one integer-keyed and one UUID-keyed; this unifies on UUID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An operator's access level. Persisted as lowercase text; never as the
/// enum's Rust variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Viewer,
}

impl Role {
    /// Parse a role from arbitrary-case input, the way a login form or an
    /// env-configured bootstrap role would supply it.
    #[must_use]
    pub fn from_input(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// A dashboard operator account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Operator {
    pub id: Uuid,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An opaque, server-stored refresh token. Only the digest is persisted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub operator_id: Uuid,
    #[serde(skip)]
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Liveness classification of a registered machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    Idle,
    Offline,
    Shutdown,
}

/// A registered end-user machine and its cumulative telemetry totals.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Machine {
    pub id: Uuid,
    pub fingerprint: String,
    pub hostname: String,
    pub os_type: String,
    pub os_version: Option<String>,
    pub ip_address: Option<String>,
    pub status: MachineStatus,
    pub total_idle_seconds: i64,
    pub energy_wasted_kwh: f64,
    pub energy_cost: f64,
    pub co2_kg: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub is_active: bool,
    pub agent_version: Option<String>,
    pub notes: Option<String>,
}

/// The one-to-one agent credential for a [`Machine`]. Only the digest of the
/// raw token is ever persisted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentToken {
    pub id: Uuid,
    pub machine_id: Uuid,
    #[serde(skip)]
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub revoked: bool,
}

/// An immutable heartbeat / energy-metric history row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Heartbeat {
    pub id: Uuid,
    pub machine_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub idle_seconds: i64,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub is_idle: bool,
    pub energy_delta_kwh: f64,
    pub cost_delta: f64,
    pub co2_delta_kg: f64,
}

/// Lifecycle state of a [`ShutdownCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Executed,
    Rejected,
    Expired,
}

/// A gated remote-shutdown command targeting one [`Machine`].
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShutdownCommand {
    pub id: Uuid,
    pub machine_id: Uuid,
    pub issued_by: Uuid,
    pub status: CommandStatus,
    pub idle_threshold_minutes: i32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
}

/// A write-only audit trail entry. Never read back by the core; logging's
/// durable counterpart.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_operator_id: Option<Uuid>,
    pub action: String,
    pub machine_id: Option<Uuid>,
    pub command_id: Option<Uuid>,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
