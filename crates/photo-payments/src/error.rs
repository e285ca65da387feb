//! Payment Error Types

use photo_core::StoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors raised while turning a payment notification into a purchase record
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Notification cannot ever be processed (e.g. no session id)
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// The purchase record could not be written
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl PaymentError {
    /// Check if the sender should redeliver the notification
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::InvalidNotification(_) | Self::WebhookSignature(_) | Self::WebhookParse(_) => false,
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::InvalidNotification(_) => "The purchase notification is invalid.",
            Self::WebhookSignature(_) => "Invalid webhook signature.",
            Self::Store(_) => "The purchase could not be recorded. Please retry.",
            Self::WebhookParse(_) => "An error occurred processing your request.",
        }
    }
}
