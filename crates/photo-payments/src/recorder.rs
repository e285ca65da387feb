//! Purchase Recorder
//!
//! Turns a payment-completed notification into exactly one purchase record.
//! Redelivery of the same notification is answered from the store's
//! conditional create, so no separate "seen notification" set is kept.

use std::sync::Arc;

use photo_core::validation::{MAX_QUANTITY_PER_ITEM, default_file_name, is_safe_asset_path};
use photo_core::{CreateOutcome, EntitlementStore, LineItem, PurchaseRecord};

use crate::error::{PaymentError, Result};
use crate::notification::{CartItem, PurchaseNotification};

/// What a call to `record_purchase` did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First delivery: the record was written
    Created { items: usize, dropped: usize },
    /// The session was already recorded; nothing changed
    AlreadyRecorded,
}

impl RecordOutcome {
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Why a cart line was not turned into a line item
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DropReason {
    MissingProductId,
    MissingAssetPath,
    UnsafeAssetPath,
    InvalidQuantity,
    QuantityTooLarge,
    MergedQuantityTooLarge,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::MissingProductId => "missing productId",
            Self::MissingAssetPath => "missing assetPath",
            Self::UnsafeAssetPath => "assetPath escapes the asset root",
            Self::InvalidQuantity => "quantity must be a positive integer",
            Self::QuantityTooLarge => "quantity exceeds the per-item limit",
            Self::MergedQuantityTooLarge => "merged quantity exceeds the per-item limit",
        }
    }
}

/// Records purchases into an entitlement store
pub struct PurchaseRecorder<S: EntitlementStore + ?Sized> {
    store: Arc<S>,
}

impl<S: EntitlementStore + ?Sized> PurchaseRecorder<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record a completed payment.
    ///
    /// Returns `Ok` both when the record is created and when it already
    /// existed. Store failures are returned as errors so the sender
    /// redelivers; nothing is retried here.
    pub async fn record_purchase(&self, notification: PurchaseNotification) -> Result<RecordOutcome> {
        let PurchaseNotification {
            session_id,
            customer_email,
            cart_items,
        } = notification;

        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(PaymentError::InvalidNotification("sessionId is empty".into()));
        }

        let (items, dropped) = build_line_items(session_id, &cart_items);
        let item_count = items.len();

        if items.is_empty() {
            tracing::warn!(
                session_id = %session_id,
                dropped,
                "Paid session has no valid line items; recording it anyway"
            );
        }

        let customer_email = customer_email
            .map(|email| email.trim().to_owned())
            .filter(|email| !email.is_empty());
        let record = PurchaseRecord::new(session_id, customer_email, items);

        match self.store.create_if_absent(&record).await? {
            CreateOutcome::Created => {
                tracing::info!(
                    session_id = %record.session_id,
                    items = item_count,
                    dropped,
                    "Recorded purchase"
                );
                Ok(RecordOutcome::Created {
                    items: item_count,
                    dropped,
                })
            }
            CreateOutcome::AlreadyExists => {
                tracing::info!(
                    session_id = %record.session_id,
                    "Purchase already recorded; ignoring duplicate notification"
                );
                Ok(RecordOutcome::AlreadyRecorded)
            }
        }
    }
}

/// Validate cart lines, merging repeated product ids.
///
/// Returns the retained items and the number of dropped lines.
fn build_line_items(session_id: &str, cart_items: &[CartItem]) -> (Vec<LineItem>, usize) {
    let mut items: Vec<LineItem> = Vec::with_capacity(cart_items.len());
    let mut dropped = 0;

    for (index, cart_item) in cart_items.iter().enumerate() {
        let result = line_item(cart_item).and_then(|item| {
            match items.iter_mut().find(|existing| existing.product_id == item.product_id) {
                Some(existing) => {
                    let merged = existing
                        .quantity_purchased
                        .checked_add(item.quantity_purchased)
                        .filter(|merged| *merged <= MAX_QUANTITY_PER_ITEM)
                        .ok_or(DropReason::MergedQuantityTooLarge)?;
                    tracing::warn!(
                        session_id,
                        product_id = %item.product_id,
                        quantity = merged,
                        "Repeated product in cart; merging quantities"
                    );
                    existing.quantity_purchased = merged;
                }
                None => items.push(item),
            }
            Ok(())
        });

        if let Err(reason) = result {
            dropped += 1;
            tracing::warn!(
                session_id,
                index,
                product_id = ?cart_item.product_id,
                reason = reason.as_str(),
                "Dropping malformed cart item"
            );
        }
    }

    (items, dropped)
}

fn line_item(cart_item: &CartItem) -> std::result::Result<LineItem, DropReason> {
    let product_id = non_empty(cart_item.product_id.as_deref()).ok_or(DropReason::MissingProductId)?;
    let asset_path = non_empty(cart_item.asset_path.as_deref()).ok_or(DropReason::MissingAssetPath)?;

    if !is_safe_asset_path(asset_path) {
        return Err(DropReason::UnsafeAssetPath);
    }

    let quantity = cart_item
        .quantity()
        .filter(|quantity| *quantity > 0)
        .ok_or(DropReason::InvalidQuantity)?;
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|quantity| *quantity <= MAX_QUANTITY_PER_ITEM)
        .ok_or(DropReason::QuantityTooLarge)?;

    let title = non_empty(cart_item.title.as_deref()).unwrap_or(product_id);
    let file_name = non_empty(cart_item.file_name.as_deref())
        .map(str::to_owned)
        .or_else(|| default_file_name(asset_path))
        .unwrap_or_else(|| product_id.to_owned());

    Ok(LineItem::new(product_id, title, file_name, asset_path, quantity))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
