// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod account;
pub mod payment;
pub mod script;

pub use account::{Account, Balances, LedgerGuard, LedgerMutation, Plan, SubscriptionStatus};
pub use payment::{CreditPack, PaymentNotes, Purchase, VerifyPaymentRequest, WebhookEnvelope};
pub use script::{GeneratedScript, GenerationRequest, ScriptVariation, Tone, WordBand};
