//! Entitlement Store
//!
//! Durable storage for purchase records, keyed by `"purchase:" + session_id`.

mod memory;
mod sqlite;

pub use memory::MemoryEntitlementStore;
pub use sqlite::SqliteEntitlementStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::PurchaseRecord;

/// Result of a conditional create
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This call wrote the record
    Created,
    /// A record for the session already existed; nothing was written
    AlreadyExists,
}

/// Result of consuming a line item's entitlement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// This call moved `quantity_downloaded` to `quantity_purchased`
    Consumed,
    /// Another call got there first
    AlreadyConsumed,
    /// No such session, or no such product in it
    NotFound,
}

/// Entitlement storage trait (Strategy pattern)
///
/// Implementations must make `create_if_absent` and
/// `mark_item_fully_downloaded` linearizable per session: of any number of
/// concurrent callers, exactly one observes `Created` / `Consumed`.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Fetch the record for a session
    async fn get(&self, session_id: &str) -> Result<Option<PurchaseRecord>>;

    /// Write the record unless one already exists for its session
    async fn create_if_absent(&self, record: &PurchaseRecord) -> Result<CreateOutcome>;

    /// Atomically consume the whole entitlement of one line item
    async fn mark_item_fully_downloaded(
        &self,
        session_id: &str,
        product_id: &str,
    ) -> Result<ConsumeOutcome>;

    /// Backend name (for health reporting)
    fn name(&self) -> &str;
}
