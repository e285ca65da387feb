//! Stripe Webhook Handling
//!
//! Verifies Stripe webhook signatures and feeds paid checkout sessions to the
//! purchase recorder. The cart travels in the session metadata under
//! `cart_items` as a JSON array, set when the checkout session is created.

use std::sync::Arc;
use stripe::{CheckoutSession, CheckoutSessionPaymentStatus, Event, EventObject, EventType, Webhook};

use photo_core::EntitlementStore;

use crate::error::{PaymentError, Result};
use crate::notification::{PurchaseNotification, parse_cart_items};
use crate::recorder::{PurchaseRecorder, RecordOutcome};

/// Checkout-session metadata key holding the cart payload
pub const CART_ITEMS_METADATA_KEY: &str = "cart_items";

/// What a processed webhook amounted to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Paid checkout - purchase recorded (or already was)
    PurchaseRecorded {
        session_id: String,
        outcome: RecordOutcome,
    },

    /// Checkout completed but the payment has not settled yet
    PaymentPending { session_id: String },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler<S: EntitlementStore + ?Sized> {
    recorder: Arc<PurchaseRecorder<S>>,
    webhook_secret: String,
}

impl<S: EntitlementStore + ?Sized> WebhookHandler<S> {
    pub fn new(recorder: Arc<PurchaseRecorder<S>>, webhook_secret: impl Into<String>) -> Self {
        Self {
            recorder,
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &str, signature: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, &self.webhook_secret)
            .map_err(|e| PaymentError::WebhookSignature(e.to_string()))
    }

    /// Process a verified webhook event
    pub async fn handle(&self, event: Event) -> Result<WebhookEvent> {
        tracing::info!(event_id = %event.id, event_type = ?event.type_, "Processing Stripe webhook");

        match event.type_ {
            EventType::CheckoutSessionCompleted | EventType::CheckoutSessionAsyncPaymentSucceeded => {
                let EventObject::CheckoutSession(session) = &event.data.object else {
                    return Err(PaymentError::WebhookParse("Invalid checkout session data".into()));
                };

                if !is_paid(session) {
                    tracing::info!(
                        session_id = %session.id,
                        payment_status = ?session.payment_status,
                        "Checkout completed without settled payment; waiting for async result"
                    );
                    return Ok(WebhookEvent::PaymentPending {
                        session_id: session.id.to_string(),
                    });
                }

                let notification = notification_from_session(session);
                let session_id = notification.session_id.clone();
                let outcome = self.recorder.record_purchase(notification).await?;

                Ok(WebhookEvent::PurchaseRecorded {
                    session_id,
                    outcome,
                })
            }

            _ => {
                tracing::debug!(event_type = ?event.type_, "Unhandled webhook event");
                Ok(WebhookEvent::Other {
                    event_type: format!("{:?}", event.type_),
                })
            }
        }
    }
}

fn is_paid(session: &CheckoutSession) -> bool {
    matches!(
        session.payment_status,
        CheckoutSessionPaymentStatus::Paid | CheckoutSessionPaymentStatus::NoPaymentRequired
    )
}

fn notification_from_session(session: &CheckoutSession) -> PurchaseNotification {
    let customer_email = session
        .customer_details
        .as_ref()
        .and_then(|details| details.email.clone())
        .or_else(|| session.customer_email.clone());

    let cart_payload = session
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.get(CART_ITEMS_METADATA_KEY))
        .map(String::as_str);

    checkout_notification(session.id.as_str(), customer_email, cart_payload)
}

/// Build a notification from the pieces of a paid checkout session.
///
/// A missing or undecodable cart is logged and recorded as an empty cart: the
/// payment went through, and failing here would only make Stripe retry a
/// notification that can never succeed.
pub fn checkout_notification(
    session_id: &str,
    customer_email: Option<String>,
    cart_payload: Option<&str>,
) -> PurchaseNotification {
    let cart_items = match cart_payload {
        Some(payload) => parse_cart_items(payload).unwrap_or_else(|e| {
            tracing::warn!(session_id, error = %e, "Undecodable cart_items metadata");
            Vec::new()
        }),
        None => {
            tracing::warn!(session_id, "Checkout session has no cart_items metadata");
            Vec::new()
        }
    };

    PurchaseNotification::new(session_id, customer_email, cart_items)
}
