//! Payment-completed notifications
//!
//! The wire shape accepted from the payment side:
//!
//! ```json
//! { "sessionId": "cs_...", "customerEmail": "a@example.com",
//!   "cartItems": [{ "productId": "p1", "title": "Dunes", "fileName": "dunes.jpg",
//!                   "assetPath": "prints/dunes.jpg", "quantity": 2 }] }
//! ```
//!
//! Cart items are decoded leniently: an entry that does not even look like an
//! item becomes an empty `CartItem`, which the recorder then drops and logs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A completed payment, as delivered by the notification transport
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseNotification {
    /// Payment-provider session id
    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default, deserialize_with = "lenient_cart")]
    pub cart_items: Vec<CartItem>,
}

impl PurchaseNotification {
    pub fn new(
        session_id: impl Into<String>,
        customer_email: Option<String>,
        cart_items: Vec<CartItem>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            customer_email,
            cart_items,
        }
    }
}

/// One raw cart line, before validation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub asset_path: Option<String>,
    /// Number or numeric string
    #[serde(default)]
    pub quantity: Option<Value>,
}

impl CartItem {
    pub fn new(
        product_id: impl Into<String>,
        title: impl Into<String>,
        file_name: impl Into<String>,
        asset_path: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            product_id: Some(product_id.into()),
            title: Some(title.into()),
            file_name: Some(file_name.into()),
            asset_path: Some(asset_path.into()),
            quantity: Some(Value::from(quantity)),
        }
    }

    /// Quantity as a signed integer, if it is one
    pub fn quantity(&self) -> Option<i64> {
        match self.quantity.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Decode a cart-items JSON payload (e.g. from checkout-session metadata)
pub fn parse_cart_items(payload: &str) -> serde_json::Result<Vec<CartItem>> {
    let values: Vec<Value> = serde_json::from_str(payload)?;
    Ok(values.into_iter().map(cart_item_or_empty).collect())
}

fn lenient_cart<'de, D>(deserializer: D) -> std::result::Result<Vec<CartItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values.into_iter().map(cart_item_or_empty).collect())
}

fn cart_item_or_empty(value: Value) -> CartItem {
    serde_json::from_value(value).unwrap_or_default()
}
