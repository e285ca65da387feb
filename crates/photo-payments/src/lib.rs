//! # photo-payments
//!
//! Records what a customer paid for.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐   checkout.session.completed   ┌──────────────────┐
//! │   Stripe    │───────────────────────────────▶│  WebhookHandler  │
//! └─────────────┘                                └────────┬─────────┘
//!                                                         │ PurchaseNotification
//! ┌─────────────┐   JSON notification            ┌────────▼─────────┐
//! │  Internal   │───────────────────────────────▶│ PurchaseRecorder │──▶ EntitlementStore
//! │  transport  │                                └──────────────────┘     create_if_absent
//! └─────────────┘
//! ```
//!
//! Notifications are delivered at least once. The recorder answers a
//! redelivery with success and leaves the existing record untouched.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use photo_core::MemoryEntitlementStore;
//! use photo_payments::{CartItem, PurchaseNotification, PurchaseRecorder};
//!
//! let recorder = PurchaseRecorder::new(Arc::new(MemoryEntitlementStore::new()));
//!
//! recorder.record_purchase(PurchaseNotification::new(
//!     "cs_test_123",
//!     Some("a@example.com".into()),
//!     vec![CartItem::new("p1", "Dunes", "dunes.jpg", "prints/dunes.jpg", 2)],
//! )).await?;
//! ```

mod error;
mod notification;
mod recorder;
mod webhook;

pub use error::{PaymentError, Result};
pub use notification::{CartItem, PurchaseNotification, parse_cart_items};
pub use recorder::{PurchaseRecorder, RecordOutcome};
pub use webhook::{CART_ITEMS_METADATA_KEY, WebhookEvent, WebhookHandler, checkout_notification};
