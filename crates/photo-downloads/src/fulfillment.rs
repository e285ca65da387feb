//! Download Fulfillment
//!
//! Serves each purchased product at most once per session. The entitlement is
//! consumed in the store *before* any byte is produced: a failed stream costs
//! the customer a support ticket, whereas marking afterwards would let a
//! crashed or slow transfer be retried forever.

use std::sync::Arc;

use photo_core::{ConsumeOutcome, EntitlementStore};

use crate::assets::AssetRoot;
use crate::bundle::{self, Download};
use crate::error::Result;
use crate::query::{EntitlementSummary, list_entitlements};

/// Why a download was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    /// No purchase recorded for this session (yet)
    UnknownSession,
    /// The product is not part of this purchase
    UnknownProduct,
    /// The entitlement has already been used
    AlreadyConsumed,
}

impl Denial {
    /// Stable machine-readable code
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::UnknownProduct => "UNKNOWN_PRODUCT",
            Self::AlreadyConsumed => "ALREADY_CONSUMED",
        }
    }

    /// Only an unknown session can resolve itself: the purchase notification
    /// may simply not have been processed yet.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::UnknownSession)
    }

    /// Get user-friendly message
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::UnknownSession => "We could not find this purchase yet. Please try again in a moment.",
            Self::UnknownProduct => "This photo is not part of your purchase.",
            Self::AlreadyConsumed => "You have already downloaded this item.",
        }
    }
}

/// Result of a fulfillment request
#[derive(Debug)]
pub enum FulfillOutcome {
    Delivered(Download),
    Denied(Denial),
}

/// Download fulfillment service
pub struct DownloadService<S: EntitlementStore + ?Sized> {
    store: Arc<S>,
    assets: AssetRoot,
}

impl<S: EntitlementStore + ?Sized> DownloadService<S> {
    pub const fn new(store: Arc<S>, assets: AssetRoot) -> Self {
        Self { store, assets }
    }

    pub const fn assets(&self) -> &AssetRoot {
        &self.assets
    }

    /// Consume the entitlement for `product_id` and produce its download.
    ///
    /// Concurrent calls for the same pair race on the store's conditional
    /// write; exactly one of them is delivered. Failures after the write do
    /// not give the entitlement back.
    pub async fn fulfill(&self, session_id: &str, product_id: &str) -> Result<FulfillOutcome> {
        let Some(record) = self.store.get(session_id).await? else {
            tracing::debug!(session_id, product_id, "Download for unknown session");
            return Ok(FulfillOutcome::Denied(Denial::UnknownSession));
        };

        let Some(item) = record.item(product_id) else {
            tracing::info!(session_id, product_id, "Download for product not in purchase");
            return Ok(FulfillOutcome::Denied(Denial::UnknownProduct));
        };

        // Fast path only; the conditional write below is authoritative.
        if item.is_fully_consumed() {
            return Ok(FulfillOutcome::Denied(Denial::AlreadyConsumed));
        }

        let source = self.assets.resolve(&item.asset_path).await.inspect_err(|e| {
            tracing::error!(session_id, product_id, error = %e, "Purchased asset is unavailable");
        })?;

        match self.store.mark_item_fully_downloaded(session_id, product_id).await? {
            ConsumeOutcome::Consumed => {}
            ConsumeOutcome::AlreadyConsumed => {
                tracing::info!(session_id, product_id, "Lost race for entitlement");
                return Ok(FulfillOutcome::Denied(Denial::AlreadyConsumed));
            }
            ConsumeOutcome::NotFound => {
                return Ok(FulfillOutcome::Denied(Denial::UnknownSession));
            }
        }

        tracing::info!(
            session_id,
            product_id,
            copies = item.quantity_purchased,
            "Entitlement consumed"
        );

        let packaged = if item.quantity_purchased == 1 {
            bundle::single(&source, &item.file_name).await
        } else {
            bundle::bundle(source, &item.file_name, item.quantity_purchased).await
        };

        match packaged {
            Ok(download) => Ok(FulfillOutcome::Delivered(download)),
            Err(e) => {
                tracing::error!(
                    session_id,
                    product_id,
                    error = %e,
                    "Packaging failed after entitlement was consumed"
                );
                Err(e)
            }
        }
    }

    /// Read-only view of a session's entitlements; `None` if unknown
    pub async fn list_entitlements(&self, session_id: &str) -> Result<Option<Vec<EntitlementSummary>>> {
        Ok(list_entitlements(self.store.as_ref(), session_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::DownloadKind;
    use crate::bundle::tests::{collect, unzip};
    use crate::error::DownloadError;
    use async_trait::async_trait;
    use photo_core::{
        CreateOutcome, LineItem, MemoryEntitlementStore, PurchaseRecord, StoreError,
    };

    struct Fixture {
        _assets: tempfile::TempDir,
        store: Arc<MemoryEntitlementStore>,
        service: Arc<DownloadService<MemoryEntitlementStore>>,
    }

    async fn fixture() -> Fixture {
        let assets = tempfile::tempdir().unwrap();
        std::fs::create_dir(assets.path().join("prints")).unwrap();
        std::fs::write(assets.path().join("prints/dunes.jpg"), b"dunes").unwrap();
        std::fs::write(assets.path().join("prints/harbor.png"), b"harbor").unwrap();

        let store = Arc::new(MemoryEntitlementStore::new());
        store
            .create_if_absent(&PurchaseRecord::new(
                "sess_1",
                Some("a@example.com".into()),
                vec![LineItem::new("p1", "Dunes", "dunes.jpg", "prints/dunes.jpg", 2)],
            ))
            .await
            .unwrap();
        store
            .create_if_absent(&PurchaseRecord::new(
                "sess_2",
                None,
                vec![
                    LineItem::new("p1", "Dunes", "dunes.jpg", "prints/dunes.jpg", 1),
                    LineItem::new("p2", "Harbor", "harbor.png", "prints/harbor.png", 1),
                    LineItem::new("p3", "Lost", "lost.jpg", "prints/lost.jpg", 1),
                ],
            ))
            .await
            .unwrap();

        let service = Arc::new(DownloadService::new(store.clone(), AssetRoot::new(assets.path())));
        Fixture {
            _assets: assets,
            store,
            service,
        }
    }

    fn delivered(outcome: FulfillOutcome) -> Download {
        match outcome {
            FulfillOutcome::Delivered(download) => download,
            FulfillOutcome::Denied(denial) => panic!("expected delivery, got {denial:?}"),
        }
    }

    fn denied(outcome: FulfillOutcome) -> Denial {
        match outcome {
            FulfillOutcome::Denied(denial) => denial,
            FulfillOutcome::Delivered(download) => panic!("expected denial, got {download:?}"),
        }
    }

    #[tokio::test]
    async fn test_multi_copy_purchase_is_bundled_once() {
        let fx = fixture().await;

        let download = delivered(fx.service.fulfill("sess_1", "p1").await.unwrap());
        assert_eq!(download.kind, DownloadKind::Bundle { copies: 2 });

        let entries = unzip(collect(download).await);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "dunes_copy_1.jpg");
        assert_eq!(entries[1].0, "dunes_copy_2.jpg");

        assert_eq!(
            denied(fx.service.fulfill("sess_1", "p1").await.unwrap()),
            Denial::AlreadyConsumed
        );

        let record = fx.store.get("sess_1").await.unwrap().unwrap();
        assert_eq!(record.items[0].quantity_downloaded, 2);
    }

    #[tokio::test]
    async fn test_single_copy_is_streamed_directly() {
        let fx = fixture().await;

        let download = delivered(fx.service.fulfill("sess_2", "p1").await.unwrap());
        assert_eq!(download.kind, DownloadKind::Single);
        assert_eq!(download.file_name, "dunes.jpg");
        assert_eq!(download.content_length, 5);
        assert_eq!(collect(download).await, b"dunes");
    }

    #[tokio::test]
    async fn test_unknown_session_and_product() {
        let fx = fixture().await;

        let unknown_session = denied(fx.service.fulfill("sess_unknown", "p1").await.unwrap());
        assert_eq!(unknown_session, Denial::UnknownSession);
        assert!(unknown_session.is_retryable());

        let unknown_product = denied(fx.service.fulfill("sess_1", "p9").await.unwrap());
        assert_eq!(unknown_product, Denial::UnknownProduct);
        assert!(!unknown_product.is_retryable());
    }

    #[tokio::test]
    async fn test_products_are_independent() {
        let fx = fixture().await;

        delivered(fx.service.fulfill("sess_2", "p1").await.unwrap());

        let record = fx.store.get("sess_2").await.unwrap().unwrap();
        assert_eq!(record.item("p1").unwrap().quantity_downloaded, 1);
        assert_eq!(record.item("p2").unwrap().quantity_downloaded, 0);

        delivered(fx.service.fulfill("sess_2", "p2").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_asset_does_not_spend_entitlement() {
        let fx = fixture().await;

        let err = fx.service.fulfill("sess_2", "p3").await.unwrap_err();
        assert!(matches!(err, DownloadError::AssetUnavailable(_)));

        let record = fx.store.get("sess_2").await.unwrap().unwrap();
        assert_eq!(record.item("p3").unwrap().quantity_downloaded, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_deliver_exactly_once() {
        let fx = fixture().await;

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let service = fx.service.clone();
                tokio::spawn(async move { service.fulfill("sess_1", "p1").await })
            })
            .collect();

        let mut delivered_count = 0;
        let mut already_consumed = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                FulfillOutcome::Delivered(_) => delivered_count += 1,
                FulfillOutcome::Denied(Denial::AlreadyConsumed) => already_consumed += 1,
                FulfillOutcome::Denied(other) => panic!("unexpected denial {other:?}"),
            }
        }

        assert_eq!(delivered_count, 1);
        assert_eq!(already_consumed, 11);
    }

    #[tokio::test]
    async fn test_list_entitlements_reflects_consumption() {
        let fx = fixture().await;
        delivered(fx.service.fulfill("sess_2", "p2").await.unwrap());

        let summaries = fx.service.list_entitlements("sess_2").await.unwrap().unwrap();
        assert_eq!(summaries.len(), 3);
        assert!(!summaries[0].fully_consumed);
        assert_eq!(summaries[0].remaining, 1);
        assert!(summaries[1].fully_consumed);
        assert_eq!(summaries[1].remaining, 0);

        assert!(fx.service.list_entitlements("sess_unknown").await.unwrap().is_none());
    }

    /// Reads succeed but conditional writes fail
    struct ReadOnlyStore(MemoryEntitlementStore);

    #[async_trait]
    impl EntitlementStore for ReadOnlyStore {
        async fn get(&self, session_id: &str) -> photo_core::Result<Option<PurchaseRecord>> {
            self.0.get(session_id).await
        }

        async fn create_if_absent(
            &self,
            record: &PurchaseRecord,
        ) -> photo_core::Result<CreateOutcome> {
            self.0.create_if_absent(record).await
        }

        async fn mark_item_fully_downloaded(
            &self,
            _session_id: &str,
            _product_id: &str,
        ) -> photo_core::Result<ConsumeOutcome> {
            Err(StoreError::Backend("write rejected".into()))
        }

        fn name(&self) -> &str {
            "read-only"
        }
    }

    #[tokio::test]
    async fn test_failed_consumption_streams_nothing() {
        let fx = fixture().await;
        let store = ReadOnlyStore(MemoryEntitlementStore::new());
        store
            .create_if_absent(&fx.store.get("sess_2").await.unwrap().unwrap())
            .await
            .unwrap();
        let service = DownloadService::new(Arc::new(store), fx.service.assets().clone());

        let err = service.fulfill("sess_2", "p1").await.unwrap_err();
        assert!(matches!(err, DownloadError::Store(_)));
        assert!(err.is_retryable());
    }
}
