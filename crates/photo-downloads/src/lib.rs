//! # photo-downloads
//!
//! Entitlement-bounded download fulfillment.
//!
//! ```text
//! fulfill(session, product)
//!   │
//!   ├─ get record ─────────────── none ──▶ Denied(UnknownSession)
//!   ├─ find item ──────────────── none ──▶ Denied(UnknownProduct)
//!   ├─ already consumed? ───────── yes ──▶ Denied(AlreadyConsumed)
//!   ├─ resolve asset ──────────── fail ──▶ Err(AssetUnavailable)   (nothing spent)
//!   ├─ mark_item_fully_downloaded ─ lost ─▶ Denied(AlreadyConsumed)
//!   └─ package
//!        ├─ 1 copy  ──▶ original file stream
//!        └─ n copies ─▶ store-only ZIP: <name>_copy_1.<ext> .. <name>_copy_n.<ext>
//! ```

pub mod assets;
pub mod bundle;
mod error;
mod fulfillment;
pub mod query;

pub use assets::AssetRoot;
pub use bundle::{Download, DownloadKind};
pub use error::{DownloadError, Result};
pub use fulfillment::{Denial, DownloadService, FulfillOutcome};
pub use query::{EntitlementSummary, list_entitlements};
