//! HTTP error types for the `WattGuard` server.
//!
//! Maps domain errors from `wattguard-core` and `wattguard-storage` into
//! appropriate HTTP responses. Every error variant produces a JSON body with
//! a machine-readable `error` field and a human-readable `message`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use wattguard_core::error::{BootstrapError, CommandError, CredentialError, RegistryError, SessionError, TelemetryError};
use wattguard_storage::error::StorageError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed or token invalid.
    Unauthorized(String),
    /// The authenticated caller lacks permission for this operation.
    Forbidden(String),
    /// Requested resource not found.
    NotFound(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// A conflict (e.g. duplicate username, duplicate fingerprint).
    Conflict(String),
    /// Too many requests from this client.
    RateLimited(String),
    /// Internal server error. The original cause is logged at the call
    /// site; this message is generic on purpose so it is always safe to
    /// forward toward a client.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let is_unauthorized = matches!(self, Self::Unauthorized(_));

        let (status, error_type, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if is_unauthorized {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Mismatch => Self::Unauthorized("invalid credentials".to_owned()),
            CredentialError::HashFailed { .. } | CredentialError::MalformedHash { .. } => {
                tracing::error!(error = %err, "credential error");
                Self::Internal("internal error".to_owned())
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidAccessToken | SessionError::InvalidRefreshToken => {
                Self::Unauthorized(err.to_string())
            }
            SessionError::Sign(_) => {
                tracing::error!(error = %err, "session error");
                Self::Internal("internal error".to_owned())
            }
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Fingerprint(_) => Self::BadRequest(err.to_string()),
            RegistryError::InvalidAgentToken => Self::Unauthorized(err.to_string()),
            RegistryError::MachineNotFound => Self::NotFound(err.to_string()),
            RegistryError::Storage(_) => {
                tracing::error!(error = %err, "registry storage error");
                Self::Internal("internal error".to_owned())
            }
        }
    }
}

impl From<TelemetryError> for AppError {
    fn from(err: TelemetryError) -> Self {
        match err {
            TelemetryError::IdleSecondsOutOfRange(_) | TelemetryError::PercentOutOfRange { .. } => {
                Self::BadRequest(err.to_string())
            }
            TelemetryError::Storage(_) => {
                tracing::error!(error = %err, "telemetry storage error");
                Self::Internal("internal error".to_owned())
            }
        }
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::MachineNotIdle { .. } => Self::BadRequest(err.to_string()),
            CommandError::MachineNotFound | CommandError::CommandNotFound => Self::NotFound(err.to_string()),
            CommandError::MachineMismatch => Self::BadRequest(err.to_string()),
            CommandError::Storage(_) => {
                tracing::error!(error = %err, "command storage error");
                Self::Internal("internal error".to_owned())
            }
        }
    }
}

impl From<BootstrapError> for AppError {
    fn from(err: BootstrapError) -> Self {
        tracing::error!(error = %err, "bootstrap error");
        Self::Internal("internal error".to_owned())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::Conflict(msg) => Self::Conflict(msg),
            StorageError::SchemaMissing(_) | StorageError::Internal(_) => {
                tracing::error!(error = %err, "storage error");
                Self::Internal("internal error".to_owned())
            }
        }
    }
}
