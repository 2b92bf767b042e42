// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HMAC-SHA256 signatures used by the payment gateway.
//!
//! - Webhooks: hex HMAC of the raw request body with the webhook secret.
//! - Checkout confirmations: hex HMAC of `order_id|payment_id` (orders) or
//!   `payment_id|subscription_id` (subscriptions) with the API key secret.

use crate::error::AppError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn sign(secret: &str, payload: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature over `payload` in constant time.
pub fn verify(secret: &str, payload: &[u8], signature_hex: &str) -> Result<(), AppError> {
    let expected = sign(secret, payload)?;
    let received = signature_hex.trim().to_ascii_lowercase();

    if expected.as_bytes().ct_eq(received.as_bytes()).into() {
        Ok(())
    } else {
        Err(AppError::SignatureInvalid)
    }
}

/// Verify a webhook body signature.
pub fn verify_webhook(secret: &str, body: &[u8], signature: Option<&str>) -> Result<(), AppError> {
    let Some(signature) = signature else {
        tracing::warn!("Security Alert: Webhook received without signature header");
        return Err(AppError::SignatureInvalid);
    };

    verify(secret, body, signature).inspect_err(|_| {
        tracing::warn!(
            body_len = body.len(),
            "Security Alert: Webhook signature mismatch"
        );
    })
}

/// Payload signed by the gateway for an order checkout.
pub fn order_payload(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

/// Payload signed by the gateway for a subscription checkout.
pub fn subscription_payload(payment_id: &str, subscription_id: &str) -> String {
    format!("{}|{}", payment_id, subscription_id)
}
