// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment gateway client (Razorpay).
//!
//! Handles:
//! - One-time orders for credit packs
//! - Recurring subscriptions for paid plans
//! - Subscription cancellation
//! - Order and subscription lookup, for confirming what was bought
//!
//! The gateway's asynchronous event feed is handled by the reconciler.

use crate::error::AppError;
use crate::models::payment::GatewayEntity;
use crate::models::PaymentNotes;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Billing cycles a subscription runs for before completing.
const SUBSCRIPTION_TOTAL_COUNT: u32 = 12;

/// Errors from the payment gateway API.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(String),

    #[error("gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::PaymentGateway(err.to_string())
    }
}

/// Contract of the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a one-time order and return its id.
    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        notes: &PaymentNotes,
    ) -> Result<String, GatewayError>;

    /// Create a recurring subscription and return its id.
    async fn create_subscription(
        &self,
        plan_id: &str,
        notes: &PaymentNotes,
    ) -> Result<String, GatewayError>;

    /// Cancel a subscription now or at the end of the current cycle.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        cancel_at_cycle_end: bool,
    ) -> Result<(), GatewayError>;

    /// Fetch an order with the notes written at checkout.
    async fn fetch_order(&self, order_id: &str) -> Result<GatewayEntity, GatewayError>;

    /// Fetch a subscription with its notes and current billing cycle.
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewayEntity, GatewayError>;
}

/// Razorpay REST client.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Deserialize)]
struct CreatedEntity {
    id: String,
}

impl RazorpayClient {
    /// Create a new client with API credentials.
    pub fn new(key_id: String, key_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.razorpay.com/v1".to_string(),
            key_id,
            key_secret,
        }
    }

    /// POST a JSON body with basic auth.
    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        self.send(self.http.post(&url).json(&body)).await
    }

    /// GET an entity with basic auth.
    async fn get_entity(&self, path: &str) -> Result<GatewayEntity, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        self.send(self.http.get(&url))
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid response body: {}", e)))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = request
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status { status, body })
    }

    async fn post_for_id(&self, path: &str, body: serde_json::Value) -> Result<String, GatewayError> {
        let entity: CreatedEntity = self
            .post_json(path, body)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid response body: {}", e)))?;
        Ok(entity.id)
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        notes: &PaymentNotes,
    ) -> Result<String, GatewayError> {
        let receipt = format!("receipt_{}", chrono::Utc::now().timestamp_millis());
        let id = self
            .post_for_id(
                "/orders",
                json!({
                    "amount": amount_minor,
                    "currency": currency,
                    "receipt": receipt,
                    "notes": notes,
                }),
            )
            .await?;

        tracing::info!(order_id = %id, amount_minor, "Gateway order created");
        Ok(id)
    }

    async fn create_subscription(
        &self,
        plan_id: &str,
        notes: &PaymentNotes,
    ) -> Result<String, GatewayError> {
        let id = self
            .post_for_id(
                "/subscriptions",
                json!({
                    "plan_id": plan_id,
                    "customer_notify": 1,
                    "total_count": SUBSCRIPTION_TOTAL_COUNT,
                    "notes": notes,
                }),
            )
            .await?;

        tracing::info!(subscription_id = %id, plan_id, "Gateway subscription created");
        Ok(id)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        cancel_at_cycle_end: bool,
    ) -> Result<(), GatewayError> {
        self.post_json(
            &format!("/subscriptions/{}/cancel", subscription_id),
            json!({ "cancel_at_cycle_end": u8::from(cancel_at_cycle_end) }),
        )
        .await?;

        tracing::info!(
            subscription_id,
            cancel_at_cycle_end,
            "Gateway subscription cancelled"
        );
        Ok(())
    }

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayEntity, GatewayError> {
        self.get_entity(&format!("/orders/{}", order_id)).await
    }

    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewayEntity, GatewayError> {
        self.get_entity(&format!("/subscriptions/{}", subscription_id)).await
    }
}
