// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment event reconciler.
//!
//! Two entry points feed one transition table:
//! - [`PaymentReconciler::handle_webhook`]: signed gateway events
//! - [`PaymentReconciler::verify_client_payment`]: signed checkout results
//!   posted by the browser
//!
//! Both end in [`PaymentReconciler::apply`], so a payment confirmed on both
//! paths converges on the same account state. What was bought and by whom
//! always comes from gateway-side notes, never from the browser. Renewals
//! are keyed by the billing cycle start and one-time grants by the gateway
//! payment id, so redelivered events are no-ops.

use crate::db::{LedgerStore, LedgerUpdate, UpdateOutcome};
use crate::error::AppError;
use crate::models::payment::GatewayEntity;
use crate::models::{
    Account, CreditPack, LedgerGuard, LedgerMutation, Plan, Purchase, SubscriptionStatus,
    VerifyPaymentRequest, WebhookEnvelope,
};
use crate::services::gateway::PaymentGateway;
use crate::services::signature;
use crate::time_utils::{now_rfc3339, unix_to_rfc3339};
use serde::Serialize;
use std::sync::Arc;

/// Gateway event names handled by the reconciler.
pub mod events {
    pub const SUBSCRIPTION_ACTIVATED: &str = "subscription.activated";
    pub const SUBSCRIPTION_CHARGED: &str = "subscription.charged";
    pub const SUBSCRIPTION_COMPLETED: &str = "subscription.completed";
    pub const PAYMENT_CAPTURED: &str = "payment.captured";
}

/// A confirmed payment-side state change for one account.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentTransition {
    /// Subscription started: link it and load the plan's allotment.
    SubscriptionActivated {
        subscription_ref: String,
        plan: Plan,
        period_start: String,
    },
    /// Renewal: reset the allotment, only for the linked subscription.
    SubscriptionCharged {
        subscription_ref: String,
        plan: Plan,
        period_start: String,
    },
    /// Subscription ended: back to free, only for the linked subscription.
    SubscriptionCompleted { subscription_ref: String },
    /// Credit pack paid.
    CreditsPurchased { pack: CreditPack, payment_id: String },
}

impl PaymentTransition {
    pub fn name(&self) -> &'static str {
        match self {
            PaymentTransition::SubscriptionActivated { .. } => events::SUBSCRIPTION_ACTIVATED,
            PaymentTransition::SubscriptionCharged { .. } => events::SUBSCRIPTION_CHARGED,
            PaymentTransition::SubscriptionCompleted { .. } => events::SUBSCRIPTION_COMPLETED,
            PaymentTransition::CreditsPurchased { .. } => events::PAYMENT_CAPTURED,
        }
    }

    /// Guard and mutation batch for this transition.
    pub fn plan_update(&self) -> (Option<LedgerGuard>, Vec<LedgerMutation>) {
        match self {
            PaymentTransition::SubscriptionActivated {
                subscription_ref,
                plan,
                period_start,
            } => (
                None,
                vec![
                    LedgerMutation::RenewAllotment {
                        plan: *plan,
                        monthly_allotment: plan.renewal_allotment(),
                        period_start: period_start.clone(),
                    },
                    LedgerMutation::SetSubscription {
                        subscription_ref: subscription_ref.clone(),
                        status: SubscriptionStatus::Active,
                    },
                ],
            ),
            PaymentTransition::SubscriptionCharged {
                subscription_ref,
                plan,
                period_start,
            } => (
                Some(LedgerGuard::SubscriptionIs(subscription_ref.clone())),
                vec![LedgerMutation::RenewAllotment {
                    plan: *plan,
                    monthly_allotment: plan.renewal_allotment(),
                    period_start: period_start.clone(),
                }],
            ),
            PaymentTransition::SubscriptionCompleted { subscription_ref } => (
                Some(LedgerGuard::SubscriptionIs(subscription_ref.clone())),
                vec![
                    LedgerMutation::SetPlan {
                        plan: Plan::Free,
                        monthly_allotment: 0,
                        reset_at: None,
                    },
                    LedgerMutation::ClearSubscription {
                        status: SubscriptionStatus::Expired,
                    },
                ],
            ),
            PaymentTransition::CreditsPurchased { pack, payment_id } => (
                None,
                vec![LedgerMutation::GrantOneTime {
                    amount: pack.credits(),
                    grant_key: payment_id.clone(),
                }],
            ),
        }
    }
}

/// What a reconciled event did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Applied,
    /// Already in this state (duplicate delivery or replayed grant).
    Duplicate,
    /// Event refers to a subscription no longer linked to the account.
    Stale,
    /// Event type or payment not handled here.
    Ignored,
}

impl From<UpdateOutcome> for ReconcileOutcome {
    fn from(outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::Applied => ReconcileOutcome::Applied,
            UpdateOutcome::Unchanged => ReconcileOutcome::Duplicate,
            UpdateOutcome::GuardRejected => ReconcileOutcome::Stale,
        }
    }
}

/// Applies payment confirmations to the ledger.
pub struct PaymentReconciler {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    webhook_secret: String,
    key_secret: String,
}

impl PaymentReconciler {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        webhook_secret: String,
        key_secret: String,
    ) -> Self {
        Self {
            ledger,
            gateway,
            webhook_secret,
            key_secret,
        }
    }

    /// Verify, decode and apply one webhook delivery.
    ///
    /// The signature is checked over the raw body before anything is parsed.
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
        event_id: Option<&str>,
    ) -> Result<ReconcileOutcome, AppError> {
        signature::verify_webhook(&self.webhook_secret, body, signature)?;

        let envelope: WebhookEnvelope = serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(error = %e, event_id, "Malformed webhook body");
            AppError::BadRequest("Malformed webhook body".to_string())
        })?;

        tracing::info!(event = %envelope.event, event_id, "Webhook event received");

        let Some((identity, transition)) = decode_event(envelope)? else {
            return Ok(ReconcileOutcome::Ignored);
        };

        let update = self.apply(&identity, &transition).await?;
        Ok(update.outcome.into())
    }

    /// Confirm a checkout from the client and apply the same transition the
    /// webhook would.
    ///
    /// `identity` comes from the session, never from the request body. The
    /// signature only binds the order (or subscription) to the payment, so
    /// the purchase and its owner are read back from the gateway object's
    /// notes; the client's `selectedPlan` must agree with them.
    pub async fn verify_client_payment(
        &self,
        identity: &str,
        request: &VerifyPaymentRequest,
    ) -> Result<Account, AppError> {
        let selected = Purchase::parse(&request.selected_plan)
            .ok_or_else(|| AppError::BadRequest("Invalid plan".to_string()))?;

        let (checkout_id, payload) = match selected {
            Purchase::Pack(_) => {
                let order_id = request.order_id.as_deref().ok_or_else(|| {
                    AppError::BadRequest("orderId is required for credit packs".to_string())
                })?;
                (order_id, signature::order_payload(order_id, &request.payment_id))
            }
            Purchase::Subscription(_) => {
                let subscription_id = request.subscription_id.as_deref().ok_or_else(|| {
                    AppError::BadRequest("subscriptionId is required for plans".to_string())
                })?;
                (
                    subscription_id,
                    signature::subscription_payload(&request.payment_id, subscription_id),
                )
            }
        };

        signature::verify(&self.key_secret, payload.as_bytes(), &request.signature).inspect_err(
            |_| {
                tracing::warn!(
                    identity,
                    payment_id = %request.payment_id,
                    "Security Alert: Client payment signature mismatch"
                );
            },
        )?;

        let entity = match selected {
            Purchase::Pack(_) => self.gateway.fetch_order(checkout_id).await?,
            Purchase::Subscription(_) => self.gateway.fetch_subscription(checkout_id).await?,
        };

        let owner = entity.notes.email.as_deref().map(str::trim);
        if owner != Some(identity) {
            tracing::warn!(
                identity,
                owner,
                checkout_id = %entity.id,
                "Security Alert: Checkout confirmed by another account"
            );
            return Err(AppError::BadRequest(
                "Checkout belongs to another account".to_string(),
            ));
        }

        let purchased = entity
            .purchase()
            .ok_or_else(|| AppError::BadRequest("Checkout has no purchase recorded".to_string()))?;
        if purchased != selected {
            tracing::warn!(
                identity,
                selected = selected.as_str(),
                purchased = purchased.as_str(),
                checkout_id = %entity.id,
                "Security Alert: Selected plan does not match checkout"
            );
            return Err(AppError::BadRequest(
                "Selected plan does not match checkout".to_string(),
            ));
        }

        let transition = match purchased {
            Purchase::Pack(pack) => PaymentTransition::CreditsPurchased {
                pack,
                payment_id: request.payment_id.clone(),
            },
            Purchase::Subscription(plan) => PaymentTransition::SubscriptionActivated {
                subscription_ref: entity.id.clone(),
                plan,
                // The gateway fills the cycle start once the mandate is authorized
                period_start: entity
                    .current_start
                    .and_then(unix_to_rfc3339)
                    .unwrap_or_else(now_rfc3339),
            },
        };

        let update = self.apply(identity, &transition).await?;
        Ok(update.account)
    }

    /// Apply one transition atomically.
    pub async fn apply(
        &self,
        identity: &str,
        transition: &PaymentTransition,
    ) -> Result<LedgerUpdate, AppError> {
        let (guard, mutations) = transition.plan_update();

        let update = self.ledger.apply(identity, guard, mutations).await?;

        match update.outcome {
            UpdateOutcome::Applied => tracing::info!(
                identity,
                event = transition.name(),
                plan = update.account.plan.as_str(),
                monthly_allotment = update.account.monthly_allotment,
                one_time_credits = update.account.one_time_credits,
                "Payment transition applied"
            ),
            UpdateOutcome::Unchanged => tracing::info!(
                identity,
                event = transition.name(),
                "Payment transition already applied"
            ),
            UpdateOutcome::GuardRejected => tracing::info!(
                identity,
                event = transition.name(),
                "Stale subscription event ignored"
            ),
        }

        Ok(update)
    }
}

/// Map a verified envelope to `(identity, transition)`.
///
/// `Ok(None)` means the event is acknowledged without any ledger change.
fn decode_event(
    envelope: WebhookEnvelope,
) -> Result<Option<(String, PaymentTransition)>, AppError> {
    let WebhookEnvelope {
        event,
        created_at,
        payload,
    } = envelope;

    match event.as_str() {
        events::SUBSCRIPTION_ACTIVATED
        | events::SUBSCRIPTION_CHARGED
        | events::SUBSCRIPTION_COMPLETED => {
            let entity = payload
                .subscription
                .map(|w| w.entity)
                .ok_or_else(|| missing("subscription entity"))?;
            let identity = entity_identity(&entity)?;
            let subscription_ref = entity.id.clone();

            let transition = if event == events::SUBSCRIPTION_COMPLETED {
                PaymentTransition::SubscriptionCompleted { subscription_ref }
            } else {
                let plan = entity
                    .notes
                    .plan
                    .as_deref()
                    .and_then(Plan::parse)
                    .filter(|p| *p != Plan::Free)
                    .ok_or_else(|| missing("subscription plan in notes"))?;

                // Taken from the event so a redelivery carries the same cycle
                let period_start = entity
                    .current_start
                    .or(created_at)
                    .and_then(unix_to_rfc3339)
                    .ok_or_else(|| missing("billing cycle start"))?;

                if event == events::SUBSCRIPTION_ACTIVATED {
                    PaymentTransition::SubscriptionActivated {
                        subscription_ref,
                        plan,
                        period_start,
                    }
                } else {
                    PaymentTransition::SubscriptionCharged {
                        subscription_ref,
                        plan,
                        period_start,
                    }
                }
            };

            Ok(Some((identity, transition)))
        }
        events::PAYMENT_CAPTURED => {
            let entity = payload
                .payment
                .map(|w| w.entity)
                .ok_or_else(|| missing("payment entity"))?;

            // Subscription invoices are captured too; only packs grant here.
            let Some(pack) = entity.notes.plan.as_deref().and_then(CreditPack::parse) else {
                tracing::debug!(payment_id = %entity.id, "Captured payment is not a credit pack");
                return Ok(None);
            };

            let identity = entity_identity(&entity)?;
            Ok(Some((
                identity,
                PaymentTransition::CreditsPurchased {
                    pack,
                    payment_id: entity.id,
                },
            )))
        }
        other => {
            tracing::debug!(event = other, "Unhandled webhook event");
            Ok(None)
        }
    }
}

fn entity_identity(entity: &GatewayEntity) -> Result<String, AppError> {
    entity
        .notes
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(String::from)
        .ok_or_else(|| missing("identity in notes"))
}

fn missing(what: &str) -> AppError {
    tracing::warn!(missing = what, "Webhook event incomplete");
    AppError::BadRequest(format!("Webhook event missing {}", what))
}
