//! Error types for `wattguard-core`.
//!
//! These are the domain-level errors; `wattguard-server` maps each variant
//! onto the HTTP error taxonomy (`AuthError`, `ValidationError`, ...).

/// Errors from password hashing and token verification.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The memory-hard KDF rejected the password during hashing.
    #[error("password hashing failed: {reason}")]
    HashFailed { reason: String },

    /// The supplied password does not match the stored hash.
    #[error("password does not match")]
    Mismatch,

    /// A stored password hash could not be parsed.
    #[error("stored password hash is malformed: {reason}")]
    MalformedHash { reason: String },
}

/// Errors from issuing, decoding, or rotating session tokens.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// JWT signing failed.
    #[error("failed to sign access token: {0}")]
    Sign(String),

    /// The presented access token failed signature verification or has expired.
    #[error("access token is invalid or expired")]
    InvalidAccessToken,

    /// The presented refresh token is unknown, revoked, or expired.
    #[error("refresh token is invalid, revoked, or expired")]
    InvalidRefreshToken,
}

/// Errors from fingerprint parsing.
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// The input does not match the MAC-address shape after normalization.
    #[error("'{input}' is not a valid MAC-address fingerprint")]
    Malformed { input: String },
}

/// Errors from machine registration and agent-token lookup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The supplied fingerprint was not well-formed.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// No machine matches the presented agent token, or its token is revoked.
    #[error("agent token is invalid or revoked")]
    InvalidAgentToken,

    /// The referenced machine does not exist.
    #[error("machine not found")]
    MachineNotFound,

    /// The underlying store reported a failure.
    #[error("registry storage error: {0}")]
    Storage(String),
}

/// Errors from heartbeat ingestion.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `idle_seconds` was negative or exceeded the one-day bound.
    #[error("idle_seconds {0} is out of the accepted range [0, 86400]")]
    IdleSecondsOutOfRange(i64),

    /// A percentage field was outside `[0, 100]`.
    #[error("{field} {value} is out of the accepted range [0, 100]")]
    PercentOutOfRange { field: &'static str, value: f64 },

    /// The underlying store reported a failure.
    #[error("telemetry storage error: {0}")]
    Storage(String),
}

/// Errors from shutdown-command issuance, polling, and result reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Shutdown was requested for a machine that is not idle.
    #[error("shutdown only allowed for idle machines; current status: {current_status}")]
    MachineNotIdle { current_status: String },

    /// The referenced machine does not exist.
    #[error("machine not found")]
    MachineNotFound,

    /// The referenced command does not exist.
    #[error("command not found")]
    CommandNotFound,

    /// The reporting machine does not own the referenced command.
    #[error("command does not belong to this machine")]
    MachineMismatch,

    /// The underlying store reported a failure.
    #[error("command storage error: {0}")]
    Storage(String),
}

/// Errors from the idempotent admin-bootstrap sequence.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// No initial admin password was configured, and this system never
    /// invents one — it fails loudly instead.
    #[error("no initial admin password configured; refusing to auto-generate one")]
    MissingInitialPassword,

    /// Hashing the configured initial password failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The underlying store reported a failure other than a benign race on
    /// the unique username constraint.
    #[error("bootstrap storage error: {0}")]
    Storage(String),
}
