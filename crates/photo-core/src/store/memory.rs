//! In-memory entitlement store (for development and tests)

use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;

use super::{ConsumeOutcome, CreateOutcome, EntitlementStore};
use crate::error::Result;
use crate::model::{PurchaseRecord, storage_key};

/// Records live in a map guarded by a single async `RwLock`.
///
/// Conditional writes hold the write lock across check and update, which is
/// what makes them linearizable.
#[derive(Debug, Default)]
pub struct MemoryEntitlementStore {
    records: RwLock<HashMap<String, PurchaseRecord>>,
}

impl MemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl EntitlementStore for MemoryEntitlementStore {
    async fn get(&self, session_id: &str) -> Result<Option<PurchaseRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&storage_key(session_id)).cloned())
    }

    async fn create_if_absent(&self, record: &PurchaseRecord) -> Result<CreateOutcome> {
        let mut records = self.records.write().await;

        match records.entry(record.key()) {
            Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(CreateOutcome::Created)
            }
        }
    }

    async fn mark_item_fully_downloaded(
        &self,
        session_id: &str,
        product_id: &str,
    ) -> Result<ConsumeOutcome> {
        let mut records = self.records.write().await;

        Ok(records
            .get_mut(&storage_key(session_id))
            .map_or(ConsumeOutcome::NotFound, |record| {
                record.mark_fully_downloaded(product_id)
            }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
