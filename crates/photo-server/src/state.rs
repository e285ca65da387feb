//! Application State

use std::sync::Arc;

use photo_core::EntitlementStore;
use photo_downloads::{AssetRoot, DownloadService};
use photo_payments::{PurchaseRecorder, WebhookHandler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Entitlement store (memory or file backed)
    pub store: Arc<dyn EntitlementStore>,

    /// Records purchases from payment notifications
    pub recorder: Arc<PurchaseRecorder<dyn EntitlementStore>>,

    /// Serves purchased files
    pub downloads: Arc<DownloadService<dyn EntitlementStore>>,

    /// Stripe webhook handler (optional - None if not configured)
    pub stripe: Option<Arc<WebhookHandler<dyn EntitlementStore>>>,

    /// Shared secret for the JSON notification route
    pub notify_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        assets: AssetRoot,
        stripe_webhook_secret: Option<String>,
        notify_token: Option<String>,
    ) -> Self {
        let recorder = Arc::new(PurchaseRecorder::new(store.clone()));
        let stripe = stripe_webhook_secret
            .map(|secret| Arc::new(WebhookHandler::new(recorder.clone(), secret)));

        Self {
            downloads: Arc::new(DownloadService::new(store.clone(), assets)),
            recorder,
            stripe,
            notify_token: notify_token.map(Arc::from),
            store,
        }
    }
}
