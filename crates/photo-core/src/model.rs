//! Purchase Records
//!
//! One `PurchaseRecord` exists per completed checkout session. The only
//! mutable state is `LineItem::quantity_downloaded`, and it only ever moves
//! from `0` straight to `quantity_purchased`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::store::ConsumeOutcome;

/// Key prefix for persisted purchase records
pub const STORAGE_KEY_PREFIX: &str = "purchase:";

/// Build the persisted key for a checkout session
pub fn storage_key(session_id: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{session_id}")
}

/// Payment state of a persisted purchase
///
/// Records are only written for completed payments, so there is a single
/// variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Paid,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// One purchased product within a purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Identifies the digital asset; unique within the record
    pub product_id: String,

    /// Display title
    pub title: String,

    /// File name offered to the customer
    pub file_name: String,

    /// Location of the original, relative to the asset root
    pub asset_path: String,

    /// Copies paid for
    pub quantity_purchased: u32,

    /// Copies delivered so far (0 or `quantity_purchased`)
    #[serde(default)]
    pub quantity_downloaded: u32,
}

impl LineItem {
    /// Create an unconsumed line item
    pub fn new(
        product_id: impl Into<String>,
        title: impl Into<String>,
        file_name: impl Into<String>,
        asset_path: impl Into<String>,
        quantity_purchased: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            title: title.into(),
            file_name: file_name.into(),
            asset_path: asset_path.into(),
            quantity_purchased,
            quantity_downloaded: 0,
        }
    }

    /// Copies still available for download
    pub const fn remaining(&self) -> u32 {
        self.quantity_purchased.saturating_sub(self.quantity_downloaded)
    }

    /// Whether the entitlement has been exercised
    pub const fn is_fully_consumed(&self) -> bool {
        self.quantity_downloaded >= self.quantity_purchased
    }
}

/// A completed checkout and everything it entitles the customer to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    /// Payment-provider session id (primary key)
    pub session_id: String,

    /// Informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    pub payment_status: PaymentStatus,

    pub created_at: DateTime<Utc>,

    /// Purchased products, in cart order
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl PurchaseRecord {
    /// Create a paid record stamped with the current time
    pub fn new(
        session_id: impl Into<String>,
        customer_email: Option<String>,
        items: Vec<LineItem>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            customer_email,
            payment_status: PaymentStatus::Paid,
            created_at: Utc::now(),
            items,
        }
    }

    /// Persisted key of this record
    pub fn key(&self) -> String {
        storage_key(&self.session_id)
    }

    /// Look up a line item by product id
    pub fn item(&self, product_id: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Apply the all-or-nothing consumption transition to one item.
    ///
    /// Backends call this while holding whatever guarantees exclusivity for
    /// the record; it is not atomic on its own.
    pub fn mark_fully_downloaded(&mut self, product_id: &str) -> ConsumeOutcome {
        let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        else {
            return ConsumeOutcome::NotFound;
        };

        if item.is_fully_consumed() {
            return ConsumeOutcome::AlreadyConsumed;
        }

        item.quantity_downloaded = item.quantity_purchased;
        ConsumeOutcome::Consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PurchaseRecord {
        PurchaseRecord::new(
            "sess_1",
            Some("a@example.com".into()),
            vec![
                LineItem::new("p1", "Dunes", "dunes.jpg", "prints/dunes.jpg", 2),
                LineItem::new("p2", "Harbor", "harbor.jpg", "prints/harbor.jpg", 1),
            ],
        )
    }

    #[test]
    fn test_storage_key() {
        assert_eq!(storage_key("sess_1"), "purchase:sess_1");
        assert_eq!(record().key(), "purchase:sess_1");
    }

    #[test]
    fn test_mark_consumes_whole_quantity_once() {
        let mut record = record();

        assert_eq!(record.mark_fully_downloaded("p1"), ConsumeOutcome::Consumed);
        let item = record.item("p1").unwrap();
        assert_eq!(item.quantity_downloaded, 2);
        assert_eq!(item.remaining(), 0);

        assert_eq!(
            record.mark_fully_downloaded("p1"),
            ConsumeOutcome::AlreadyConsumed
        );
        assert_eq!(record.item("p1").unwrap().quantity_downloaded, 2);
    }

    #[test]
    fn test_mark_leaves_other_items_alone() {
        let mut record = record();
        record.mark_fully_downloaded("p1");

        let other = record.item("p2").unwrap();
        assert_eq!(other.quantity_downloaded, 0);
        assert!(!other.is_fully_consumed());
    }

    #[test]
    fn test_payment_status_text() {
        assert_eq!(PaymentStatus::Paid.as_str(), "paid");
        assert_eq!("paid".parse::<PaymentStatus>(), Ok(PaymentStatus::Paid));
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_mark_unknown_product() {
        let mut record = record();
        assert_eq!(record.mark_fully_downloaded("nope"), ConsumeOutcome::NotFound);
    }

    #[test]
    fn test_serialized_layout() {
        let json = serde_json::to_value(record()).unwrap();

        assert_eq!(json["sessionId"], "sess_1");
        assert_eq!(json["paymentStatus"], "paid");
        assert_eq!(json["items"][0]["productId"], "p1");
        assert_eq!(json["items"][0]["quantityPurchased"], 2);
        assert_eq!(json["items"][0]["quantityDownloaded"], 0);

        let back: PurchaseRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record_with_time(back.created_at));
    }

    fn record_with_time(created_at: DateTime<Utc>) -> PurchaseRecord {
        PurchaseRecord { created_at, ..record() }
    }
}
