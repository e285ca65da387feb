//! HTTP Handlers

use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use photo_core::validation::attachment_disposition;
use photo_downloads::{Denial, Download, DownloadError, EntitlementSummary, FulfillOutcome};
use photo_payments::{PaymentError, PurchaseNotification, WebhookEvent};

use crate::state::AppState;

/// Header carrying the shared secret for internal notifications
pub const NOTIFY_TOKEN_HEADER: &str = "x-notify-token";

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: String,
    pub stripe_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub retryable: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationAck {
    pub status: String,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    pub session_id: String,
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementParams {
    pub session_id: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>, retryable: bool) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
            retryable,
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.name().to_owned(),
        stripe_configured: state.stripe.is_some(),
    })
}

/// Serve a purchased product, consuming its entitlement
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    match state.downloads.fulfill(&params.session_id, &params.product_id).await {
        Ok(FulfillOutcome::Delivered(download)) => Ok(download_response(download)),
        Ok(FulfillOutcome::Denied(denial)) => Err(denial_error(denial)),
        Err(e) => {
            tracing::error!(
                session_id = %params.session_id,
                product_id = %params.product_id,
                "Download failed: {}",
                e
            );
            Err(download_error(&e))
        }
    }
}

fn download_response(download: Download) -> Response {
    let headers = [
        (header::CONTENT_TYPE, download.content_type.clone()),
        (header::CONTENT_LENGTH, download.content_length.to_string()),
        (header::CONTENT_DISPOSITION, attachment_disposition(&download.file_name)),
        (header::CACHE_CONTROL, "no-store".to_owned()),
    ];

    (headers, Body::from_stream(download.body)).into_response()
}

fn denial_error(denial: Denial) -> ApiError {
    let status = match denial {
        Denial::UnknownSession | Denial::UnknownProduct => StatusCode::NOT_FOUND,
        Denial::AlreadyConsumed => StatusCode::FORBIDDEN,
    };
    api_error(status, denial.code(), denial.user_message(), denial.is_retryable())
}

fn download_error(e: &DownloadError) -> ApiError {
    let (status, code) = match e {
        DownloadError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
        DownloadError::AssetUnavailable(_) => (StatusCode::NOT_FOUND, "ASSET_UNAVAILABLE"),
        DownloadError::Archive(_) | DownloadError::Packaging(_) | DownloadError::Io(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "FULFILLMENT_FAILED")
        }
    };
    api_error(status, code, e.user_message(), e.is_retryable())
}

/// List a session's entitlements (read-only)
pub async fn list_entitlements(
    State(state): State<AppState>,
    Query(params): Query<EntitlementParams>,
) -> Result<(StatusCode, Json<Vec<EntitlementSummary>>), ApiError> {
    match state.downloads.list_entitlements(&params.session_id).await {
        Ok(Some(summaries)) => Ok((StatusCode::OK, Json(summaries))),
        Ok(None) => Ok((StatusCode::NOT_FOUND, Json(Vec::new()))),
        Err(e) => {
            tracing::error!(session_id = %params.session_id, "Entitlement lookup failed: {}", e);
            Err(download_error(&e))
        }
    }
}

/// Internal payment-completed notification
pub async fn purchase_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(notification): Json<PurchaseNotification>,
) -> Result<Json<NotificationAck>, ApiError> {
    let expected = state.notify_token.as_deref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "NOTIFICATIONS_DISABLED",
            "Notifications not configured",
            false,
        )
    })?;

    let presented = headers
        .get(NOTIFY_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !token_matches(presented, expected) {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "INVALID_TOKEN",
            "Invalid notification token",
            false,
        ));
    }

    let outcome = state
        .recorder
        .record_purchase(notification)
        .await
        .map_err(|e| payment_error(&e))?;

    Ok(Json(NotificationAck {
        status: "processed".into(),
        created: outcome.is_created(),
    }))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let handler = state.stripe.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
            false,
        )
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "MISSING_SIGNATURE",
                "Missing Stripe signature",
                false,
            )
        })?;

    let event = handler.parse_event(&body, signature).map_err(|e| {
        tracing::warn!("Webhook signature failed: {}", e);
        api_error(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid signature", false)
    })?;

    match handler.handle(event).await.map_err(|e| payment_error(&e))? {
        WebhookEvent::PurchaseRecorded { session_id, outcome } => {
            tracing::debug!(session_id = %session_id, created = outcome.is_created(), "Webhook processed");
        }
        WebhookEvent::PaymentPending { session_id } => {
            tracing::debug!(session_id = %session_id, "Webhook deferred until payment settles");
        }
        WebhookEvent::Other { .. } => {}
    }

    Ok(StatusCode::OK)
}

fn payment_error(e: &PaymentError) -> ApiError {
    let status = match e {
        PaymentError::InvalidNotification(_)
        | PaymentError::WebhookParse(_)
        | PaymentError::WebhookSignature(_) => StatusCode::BAD_REQUEST,
        PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if e.is_retryable() {
        tracing::error!("Purchase notification failed, sender should retry: {}", e);
    } else {
        tracing::warn!("Purchase notification rejected: {}", e);
    }

    let code = match e {
        PaymentError::InvalidNotification(_) => "INVALID_NOTIFICATION",
        PaymentError::WebhookParse(_) => "WEBHOOK_PARSE_ERROR",
        PaymentError::WebhookSignature(_) => "INVALID_SIGNATURE",
        PaymentError::Store(_) => "STORE_UNAVAILABLE",
    };
    api_error(status, code, e.user_message(), e.is_retryable())
}

fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
