//! Entitlement query (read side)

use serde::Serialize;

use photo_core::{EntitlementStore, LineItem};

/// Available-vs-consumed state of one purchased product
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSummary {
    pub product_id: String,
    pub title: String,
    pub file_name: String,
    pub quantity_purchased: u32,
    pub quantity_downloaded: u32,
    pub remaining: u32,
    pub fully_consumed: bool,
}

impl From<&LineItem> for EntitlementSummary {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            title: item.title.clone(),
            file_name: item.file_name.clone(),
            quantity_purchased: item.quantity_purchased,
            quantity_downloaded: item.quantity_downloaded,
            remaining: item.remaining(),
            fully_consumed: item.is_fully_consumed(),
        }
    }
}

/// List a session's entitlements without side effects.
///
/// An unknown session yields `None` rather than an error; clients poll this
/// before the purchase notification has been processed.
pub async fn list_entitlements<S: EntitlementStore + ?Sized>(
    store: &S,
    session_id: &str,
) -> photo_core::Result<Option<Vec<EntitlementSummary>>> {
    let record = store.get(session_id).await?;
    Ok(record.map(|record| record.items.iter().map(EntitlementSummary::from).collect()))
}
