//! Download Error Types

use photo_core::StoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, DownloadError>;

/// Failures while fulfilling a download.
///
/// Permanent refusals (unknown session, already consumed, ...) are not
/// errors; see `Denial`.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Entitlement store read or conditional write failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Source asset is missing, unreadable, or outside the asset root
    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    /// Writing the multi-copy archive failed
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Packaging task failed to complete
    #[error("Packaging failed: {0}")]
    Packaging(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Check if the client may retry the download
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Store(_) => "Downloads are temporarily unavailable. Please try again shortly.",
            Self::AssetUnavailable(_) => "This photo is temporarily unavailable. Please contact support.",
            Self::Archive(_) | Self::Packaging(_) | Self::Io(_) => {
                "Your download failed after it started. Please contact support."
            }
        }
    }
}
