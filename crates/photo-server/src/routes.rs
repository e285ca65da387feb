//! Router

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    download, health_check, list_entitlements, purchase_notification, stripe_webhook,
};
use crate::state::AppState;

pub fn router(state: AppState, cors_allow_origin: Option<HeaderValue>) -> Router {
    let origin = cors_allow_origin.map_or_else(|| AllowOrigin::from(Any), AllowOrigin::exact);
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Downloads
        .route("/api/entitlements", get(list_entitlements))
        .route("/api/download", get(download))

        // Payment notifications
        .route("/api/notifications/purchase-completed", post(purchase_notification))
        .route("/webhook/stripe", post(stripe_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{ErrorResponse, NOTIFY_TOKEN_HEADER, NotificationAck};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use photo_core::{EntitlementStore, MemoryEntitlementStore};
    use photo_downloads::AssetRoot;
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    struct TestApp {
        _assets: tempfile::TempDir,
        router: Router,
    }

    fn app(notify_token: Option<&str>) -> TestApp {
        let assets = tempfile::tempdir().unwrap();
        std::fs::write(assets.path().join("dunes.jpg"), b"dunes-original").unwrap();

        let store: Arc<dyn EntitlementStore> = Arc::new(MemoryEntitlementStore::new());
        let state = AppState::new(
            store,
            AssetRoot::new(assets.path()),
            None,
            notify_token.map(str::to_owned),
        );

        TestApp {
            _assets: assets,
            router: router(state, None),
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> Response {
        router.clone().oneshot(request).await.unwrap()
    }

    async fn json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn notify(token: &str, session_id: &str, quantity: i64) -> Request<Body> {
        let body = serde_json::json!({
            "sessionId": session_id,
            "customerEmail": "a@example.com",
            "cartItems": [{
                "productId": "p1",
                "title": "Dunes",
                "fileName": "dunes.jpg",
                "assetPath": "dunes.jpg",
                "quantity": quantity
            }]
        });

        Request::post("/api/notifications/purchase-completed")
            .header(header::CONTENT_TYPE, "application/json")
            .header(NOTIFY_TOKEN_HEADER, token)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(None);
        let response = send(&app.router, get("/health")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["store"], "memory");
        assert_eq!(body["stripe_configured"], false);
    }

    #[tokio::test]
    async fn test_notification_is_idempotent() {
        let app = app(Some(TOKEN));

        let first = send(&app.router, notify(TOKEN, "sess_1", 1)).await;
        assert_eq!(first.status(), StatusCode::OK);
        let ack: NotificationAck = json(first).await;
        assert!(ack.created);

        let second = send(&app.router, notify(TOKEN, "sess_1", 1)).await;
        assert_eq!(second.status(), StatusCode::OK);
        let ack: NotificationAck = json(second).await;
        assert_eq!(ack.status, "processed");
        assert!(!ack.created);
    }

    #[tokio::test]
    async fn test_notification_requires_token() {
        let app = app(Some(TOKEN));
        let response = send(&app.router, notify("wrong", "sess_1", 1)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let disabled = self::app(None);
        let response = send(&disabled.router, notify(TOKEN, "sess_1", 1)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_notification_without_session_id() {
        let app = app(Some(TOKEN));
        let response = send(&app.router, notify(TOKEN, "", 1)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = json(response).await;
        assert_eq!(error.code, "INVALID_NOTIFICATION");
    }

    #[tokio::test]
    async fn test_single_download_then_denied() {
        let app = app(Some(TOKEN));
        send(&app.router, notify(TOKEN, "sess_2", 1)).await;

        let response = send(&app.router, get("/api/download?sessionId=sess_2&productId=p1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "14");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"dunes.jpg\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"dunes-original");

        let again = send(&app.router, get("/api/download?sessionId=sess_2&productId=p1")).await;
        assert_eq!(again.status(), StatusCode::FORBIDDEN);
        let error: ErrorResponse = json(again).await;
        assert_eq!(error.code, "ALREADY_CONSUMED");
        assert!(!error.retryable);
    }

    #[tokio::test]
    async fn test_bundle_download() {
        let app = app(Some(TOKEN));
        send(&app.router, notify(TOKEN, "sess_1", 2)).await;

        let response = send(&app.router, get("/api/download?sessionId=sess_1&productId=p1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"dunes.zip\""
        );

        let length: usize = response.headers()[header::CONTENT_LENGTH]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), length);
    }

    #[tokio::test]
    async fn test_unknown_session_and_product() {
        let app = app(Some(TOKEN));
        send(&app.router, notify(TOKEN, "sess_1", 1)).await;

        let response = send(&app.router, get("/api/download?sessionId=sess_unknown&productId=p1")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: ErrorResponse = json(response).await;
        assert_eq!(error.code, "UNKNOWN_SESSION");
        assert!(error.retryable);

        let response = send(&app.router, get("/api/download?sessionId=sess_1&productId=p9")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: ErrorResponse = json(response).await;
        assert_eq!(error.code, "UNKNOWN_PRODUCT");
        assert!(!error.retryable);
    }

    #[tokio::test]
    async fn test_entitlement_listing() {
        let app = app(Some(TOKEN));

        let response = send(&app.router, get("/api/entitlements?sessionId=sess_1")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let empty: Vec<serde_json::Value> = json(response).await;
        assert!(empty.is_empty());

        send(&app.router, notify(TOKEN, "sess_1", 2)).await;
        let response = send(&app.router, get("/api/entitlements?sessionId=sess_1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let listing: Vec<serde_json::Value> = json(response).await;
        assert_eq!(listing[0]["productId"], "p1");
        assert_eq!(listing[0]["remaining"], 2);
        assert_eq!(listing[0]["fullyConsumed"], false);
    }

    #[tokio::test]
    async fn test_stripe_webhook_disabled() {
        let app = app(None);
        let request = Request::post("/webhook/stripe")
            .header("stripe-signature", "t=1,v1=00")
            .body(Body::from("{}"))
            .unwrap();

        let response = send(&app.router, request).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
