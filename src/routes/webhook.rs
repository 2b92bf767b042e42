// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for payment gateway events.

use crate::error::Result;
use crate::services::ReconcileOutcome;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Header carrying the hex HMAC of the raw body.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Header carrying the gateway's delivery id.
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/razorpay", post(handle_event))
}

#[derive(Serialize)]
struct WebhookAck {
    status: ReconcileOutcome,
}

/// Handle an incoming gateway event (POST).
///
/// The body is taken as raw bytes: the signature covers the exact bytes sent.
/// Any error response makes the gateway redeliver.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let event_id = headers.get(EVENT_ID_HEADER).and_then(|v| v.to_str().ok());

    let status = state
        .reconciler
        .handle_webhook(&body, signature, event_id)
        .await
        .inspect_err(|err| {
            tracing::warn!(
                event_id,
                error = %err,
                redelivery_helps = err.is_retryable(),
                "Webhook rejected"
            );
        })?;

    tracing::debug!(event_id, status = ?status, "Webhook processed");
    Ok(Json(WebhookAck { status }))
}
