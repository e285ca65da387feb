//! photo-store HTTP Server
//!
//! Axum-based server that records paid checkouts and serves each purchased
//! photo within the bounds of its entitlement.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photo_core::{EntitlementStore, MemoryEntitlementStore, SqliteEntitlementStore};
use photo_downloads::AssetRoot;

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize entitlement store
    let store: Arc<dyn EntitlementStore> = match &config.database_url {
        Some(url) => {
            let store = SqliteEntitlementStore::open(url).await?;
            tracing::info!("✓ Entitlements stored in {}", url);
            Arc::new(store)
        }
        None => {
            tracing::warn!("⚠ DATABASE_URL not set - entitlements are kept in memory only");
            Arc::new(MemoryEntitlementStore::new())
        }
    };

    if !config.asset_root.is_dir() {
        tracing::warn!(
            "⚠ ASSET_ROOT {} is not a directory - downloads will fail",
            config.asset_root.display()
        );
    }

    if config.stripe_webhook_secret.is_some() {
        tracing::info!("✓ Stripe webhook configured");
    } else {
        tracing::warn!("⚠ Stripe not configured - webhook disabled");
        tracing::warn!("  Set STRIPE_WEBHOOK_SECRET in .env");
    }

    if config.notify_token.is_none() {
        tracing::info!("Internal notification route disabled (NOTIFY_TOKEN not set)");
    }

    // Build application state
    let state = AppState::new(
        store,
        AssetRoot::new(&config.asset_root),
        config.stripe_webhook_secret.clone(),
        config.notify_token.clone(),
    );

    let app = routes::router(state, config.cors_allow_origin.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 photo-store server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                               - Health check");
    tracing::info!("  GET  /api/entitlements?sessionId=          - List entitlements");
    tracing::info!("  GET  /api/download?sessionId=&productId=   - Download a purchase");
    tracing::info!("  POST /api/notifications/purchase-completed - Record a purchase");
    tracing::info!("  POST /webhook/stripe                       - Stripe webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
