//! Store Error Types

use thiserror::Error;

/// Result type alias for entitlement store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Entitlement store errors
///
/// A write that cannot be confirmed as committed is always reported as one of
/// these, never as a successful outcome.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database driver error
    #[error("Store database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed on open
    #[error("Store migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Persisted record exists but cannot be decoded
    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Backend-specific failure (connection lost, throttled, ...)
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Check if the failed operation may succeed when retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => match e {
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
                // SQLITE_BUSY / SQLITE_LOCKED; constraint violations are not transient
                sqlx::Error::Database(db) => matches!(db.kind(), sqlx::error::ErrorKind::Other),
                _ => false,
            },
            Self::Backend(_) => true,
            Self::Migration(_) | Self::Corrupt { .. } => false,
        }
    }
}
