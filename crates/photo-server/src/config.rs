//! Server Configuration
//!
//! Read from the environment (after `.env` has been loaded).

use std::path::PathBuf;

use anyhow::Context;
use axum::http::HeaderValue;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (`BIND_ADDR`)
    pub bind_addr: String,

    /// Directory with the purchasable originals (`ASSET_ROOT`)
    pub asset_root: PathBuf,

    /// SQLite store location (`DATABASE_URL`); in-memory store when unset
    pub database_url: Option<String>,

    /// Enables the Stripe webhook route (`STRIPE_WEBHOOK_SECRET`)
    pub stripe_webhook_secret: Option<String>,

    /// Enables the JSON notification route (`NOTIFY_TOKEN`)
    pub notify_token: Option<String>,

    /// CORS origin (`CORS_ALLOW_ORIGIN`); any origin when unset or `*`
    pub cors_allow_origin: Option<HeaderValue>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let cors_allow_origin = match var("CORS_ALLOW_ORIGIN") {
            Some(origin) if origin != "*" => Some(
                HeaderValue::from_str(&origin).context("CORS_ALLOW_ORIGIN is not a valid header value")?,
            ),
            _ => None,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            asset_root: var("ASSET_ROOT").map_or_else(|| PathBuf::from("assets"), PathBuf::from),
            database_url: var("DATABASE_URL"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            notify_token: var("NOTIFY_TOKEN"),
            cors_allow_origin,
        })
    }
}
