// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment catalog and gateway event payloads.

use crate::models::Plan;
use serde::{Deserialize, Serialize};

/// Currency charged for one-time orders.
pub const ORDER_CURRENCY: &str = "INR";

/// One-time credit pack sold as a gateway order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditPack {
    Credit10,
    Credit20,
}

impl CreditPack {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "credit10" => Some(CreditPack::Credit10),
            "credit20" => Some(CreditPack::Credit20),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CreditPack::Credit10 => "credit10",
            CreditPack::Credit20 => "credit20",
        }
    }

    /// Credits granted once the payment is captured.
    pub fn credits(self) -> u32 {
        match self {
            CreditPack::Credit10 => 10,
            CreditPack::Credit20 => 20,
        }
    }

    /// Charge in the smallest currency unit (paise).
    pub fn amount_minor(self) -> u64 {
        match self {
            CreditPack::Credit10 => 50_000,
            CreditPack::Credit20 => 100_000,
        }
    }

    /// Price shown to the buyer.
    pub fn display_price(self) -> &'static str {
        match self {
            CreditPack::Credit10 => "$5",
            CreditPack::Credit20 => "$10",
        }
    }
}

/// Anything a user can buy at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purchase {
    Subscription(Plan),
    Pack(CreditPack),
}

impl Purchase {
    /// Parse a checkout plan name. Only paid plans and packs are purchasable.
    pub fn parse(raw: &str) -> Option<Self> {
        match Plan::parse(raw) {
            Some(plan @ (Plan::Pro | Plan::Elite)) => Some(Purchase::Subscription(plan)),
            Some(Plan::Free) => None,
            None => CreditPack::parse(raw).map(Purchase::Pack),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Purchase::Subscription(plan) => plan.as_str(),
            Purchase::Pack(pack) => pack.as_str(),
        }
    }
}

/// Metadata the application attaches to gateway objects.
///
/// Written as `{email, plan}` on orders and subscriptions and echoed back on
/// every webhook entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentNotes {
    #[serde(alias = "identity", default)]
    pub email: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_price: Option<String>,
}

impl PaymentNotes {
    pub fn new(email: &str, purchase: Purchase) -> Self {
        Self {
            email: Some(email.to_string()),
            plan: Some(purchase.as_str().to_string()),
            display_price: match purchase {
                Purchase::Pack(pack) => Some(pack.display_price().to_string()),
                Purchase::Subscription(_) => None,
            },
        }
    }
}

/// Raw webhook envelope as delivered by the gateway.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    /// Unix seconds at which the gateway raised the event
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub subscription: Option<EntityWrapper>,
    #[serde(default)]
    pub payment: Option<EntityWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct EntityWrapper {
    pub entity: GatewayEntity,
}

/// Subscription or payment entity; only the fields the ledger needs.
#[derive(Debug, Deserialize)]
pub struct GatewayEntity {
    pub id: String,
    #[serde(default, deserialize_with = "notes_or_empty")]
    pub notes: PaymentNotes,
    /// Start of the current billing cycle (subscriptions only, unix seconds)
    #[serde(default)]
    pub current_start: Option<i64>,
}

impl GatewayEntity {
    /// The purchase recorded in the notes at checkout, if any.
    pub fn purchase(&self) -> Option<Purchase> {
        self.notes.plan.as_deref().and_then(Purchase::parse)
    }
}

/// The gateway sends `notes: []` when no notes were attached.
fn notes_or_empty<'de, D>(deserializer: D) -> Result<PaymentNotes, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Object(_) => {
            serde_json::from_value(value).map_err(serde::de::Error::custom)
        }
        _ => Ok(PaymentNotes::default()),
    }
}

/// Client-side payment confirmation (secondary trust path).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(default, alias = "razorpay_order_id")]
    pub order_id: Option<String>,
    #[serde(default, alias = "razorpay_subscription_id")]
    pub subscription_id: Option<String>,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
    pub selected_plan: String,
}
