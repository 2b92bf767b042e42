// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkout and user-initiated cancellation.

use crate::db::LedgerStore;
use crate::error::AppError;
use crate::models::payment::ORDER_CURRENCY;
use crate::models::{
    Account, LedgerGuard, LedgerMutation, PaymentNotes, Plan, Purchase, SubscriptionStatus,
};
use crate::services::gateway::PaymentGateway;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// What the client checkout widget needs to open.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CheckoutResponse {
    Order {
        #[serde(rename = "orderId")]
        order_id: String,
        key: String,
    },
    Subscription {
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
        key: String,
    },
}

/// Gateway plan ids and checkout settings.
#[derive(Debug, Clone)]
pub struct BillingSettings {
    /// Public key id handed to the checkout widget
    pub key_id: String,
    pub pro_plan_id: String,
    pub elite_plan_id: String,
    pub cancel_at_cycle_end: bool,
}

impl BillingSettings {
    fn plan_id(&self, plan: Plan) -> Option<&str> {
        match plan {
            Plan::Pro => Some(self.pro_plan_id.as_str()),
            Plan::Elite => Some(self.elite_plan_id.as_str()),
            Plan::Free => None,
        }
    }
}

/// Service for checkout creation and cancellation.
pub struct BillingService {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    settings: BillingSettings,
}

impl BillingService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: BillingSettings,
    ) -> Self {
        Self {
            ledger,
            gateway,
            settings,
        }
    }

    /// Create a gateway order (credit pack) or subscription (paid plan).
    pub async fn checkout(
        &self,
        identity: &str,
        display_name: Option<&str>,
        plan: &str,
    ) -> Result<CheckoutResponse, AppError> {
        let purchase =
            Purchase::parse(plan).ok_or_else(|| AppError::BadRequest("Invalid plan".to_string()))?;

        // The account must exist before any confirmation can land on it
        self.ledger.get_account(identity, display_name).await?;

        let notes = PaymentNotes::new(identity, purchase);

        let response = match purchase {
            Purchase::Pack(pack) => {
                let order_id = self
                    .gateway
                    .create_order(pack.amount_minor(), ORDER_CURRENCY, &notes)
                    .await?;
                CheckoutResponse::Order {
                    order_id,
                    key: self.settings.key_id.clone(),
                }
            }
            Purchase::Subscription(plan) => {
                let plan_id = self
                    .settings
                    .plan_id(plan)
                    .ok_or_else(|| AppError::BadRequest("Invalid plan".to_string()))?;
                let subscription_id = self.gateway.create_subscription(plan_id, &notes).await?;
                CheckoutResponse::Subscription {
                    subscription_id,
                    key: self.settings.key_id.clone(),
                }
            }
        };

        tracing::info!(identity, purchase = purchase.as_str(), "Checkout created");
        Ok(response)
    }

    /// Cancel the active subscription.
    ///
    /// Plan and allotment stay as they are; the gateway's completion event
    /// is what finally drops the account back to free.
    pub async fn cancel(&self, identity: &str) -> Result<Account, AppError> {
        let account = self.ledger.get_account(identity, None).await?;

        let subscription_ref = match (&account.subscription_ref, account.subscription_status) {
            (Some(sub), SubscriptionStatus::Active) => sub.clone(),
            _ => return Err(AppError::BadRequest("No active subscription".to_string())),
        };

        self.gateway
            .cancel_subscription(&subscription_ref, self.settings.cancel_at_cycle_end)
            .await?;

        let update = self
            .ledger
            .apply(
                identity,
                // A completion that landed meanwhile must not be re-linked
                Some(LedgerGuard::SubscriptionIs(subscription_ref.clone())),
                vec![LedgerMutation::SetSubscription {
                    subscription_ref: subscription_ref.clone(),
                    status: SubscriptionStatus::Cancelled,
                }],
            )
            .await?;

        tracing::info!(
            identity,
            subscription_id = %subscription_ref,
            cancel_at_cycle_end = self.settings.cancel_at_cycle_end,
            "Subscription cancelled"
        );

        Ok(update.account)
    }
}
