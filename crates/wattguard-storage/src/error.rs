//! Storage-layer error type.
//!
//! Every repository function returns `Result<T, StorageError>`. `sqlx::Error`
//! is never propagated directly past this boundary — it is always classified
//! first, so a caller never has to pattern-match on a raw database error.

/// A storage-layer failure, already classified into the shape
/// `wattguard-server` needs to pick an HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (duplicate fingerprint, username, …).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A required table is missing — the schema has not been migrated.
    #[error("schema not migrated: missing table '{0}'")]
    SchemaMissing(String),

    /// Any other database failure. The original error is logged at the call
    /// site; this variant's message is generic on purpose so it is always
    /// safe to forward toward a client.
    #[error("storage error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("resource not found".to_owned()),
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some("23505") {
                    Self::Conflict("resource already exists".to_owned())
                } else {
                    tracing::error!(error = %db_err, "storage database error");
                    Self::Internal("database error".to_owned())
                }
            }
            _ => {
                tracing::error!(error = %err, "storage error");
                Self::Internal("database error".to_owned())
            }
        }
    }
}
