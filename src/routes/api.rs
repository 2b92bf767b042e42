// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Account, GenerationRequest, Plan, SubscriptionStatus, VerifyPaymentRequest};
use crate::services::entitlement::{can_generate, CreditSource};
use crate::services::{CheckoutResponse, GenerationResult};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/generate", post(generate))
        .route("/api/checkout", post(checkout))
        .route("/api/verify-payment", post(verify_payment))
        .route("/api/subscription/cancel", post(cancel_subscription))
}

// ─── Account ─────────────────────────────────────────────────

/// Account snapshot plus current entitlement.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub identity: String,
    pub display_name: Option<String>,
    pub plan: Plan,
    pub one_time_credits: u32,
    pub monthly_allotment: u32,
    pub subscription_status: SubscriptionStatus,
    pub last_allotment_reset: Option<String>,
    pub can_generate: bool,
    /// Balance the next generation would be charged against
    pub credit_source: Option<CreditSource>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        let entitlement = can_generate(&account);
        Self {
            can_generate: entitlement.is_allowed(),
            credit_source: entitlement.source(),
            identity: account.identity,
            display_name: account.display_name,
            plan: account.plan,
            one_time_credits: account.one_time_credits,
            monthly_allotment: account.monthly_allotment,
            subscription_status: account.subscription_status,
            last_allotment_reset: account.last_allotment_reset,
        }
    }
}

/// Get the current account, creating it with the starter grant on first use.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AccountResponse>> {
    let account = state
        .ledger
        .get_account(&user.identity, user.display_name.as_deref())
        .await?;

    Ok(Json(account.into()))
}

// ─── Generation ──────────────────────────────────────────────

/// Run one metered script generation.
async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationResult>> {
    let result = state
        .generation
        .generate(&user.identity, user.display_name.as_deref(), &request)
        .await?;

    Ok(Json(result))
}

// ─── Billing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct CheckoutRequest {
    plan: String,
}

/// Create a gateway order or subscription for the checkout widget.
async fn checkout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let response = state
        .billing
        .checkout(&user.identity, user.display_name.as_deref(), &request.plan)
        .await?;

    Ok(Json(response))
}

/// Confirm a completed checkout from the client.
async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<AccountResponse>> {
    let account = state
        .reconciler
        .verify_client_payment(&user.identity, &request)
        .await?;

    Ok(Json(account.into()))
}

/// Cancel the caller's active subscription.
async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AccountResponse>> {
    tracing::info!(identity = %user.identity, "User-initiated subscription cancellation");

    let account = state.billing.cancel(&user.identity).await?;
    Ok(Json(account.into()))
}
