//! # photo-core
//!
//! Purchase records and the entitlement store behind photo downloads.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  create_if_absent   ┌──────────────────────┐
//! │ Purchase Recorder│────────────────────▶│                      │
//! └──────────────────┘                     │   EntitlementStore   │
//! ┌──────────────────┐  get / mark_item_   │  (Memory | Sqlite)   │
//! │ Download Service │◀───────────────────▶│                      │
//! └──────────────────┘  fully_downloaded   └──────────────────────┘
//! ```
//!
//! The `EntitlementStore` trait is the only shared mutable resource. Every
//! mutation is scoped to a single record, so a backend only needs a
//! single-key conditional write to keep the purchase limits intact.

pub mod error;
pub mod model;
pub mod store;
pub mod validation;

pub use error::{Result, StoreError};
pub use model::{LineItem, PaymentStatus, PurchaseRecord, storage_key};
pub use store::{
    ConsumeOutcome, CreateOutcome, EntitlementStore, MemoryEntitlementStore,
    SqliteEntitlementStore,
};
