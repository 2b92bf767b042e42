// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod billing;
pub mod entitlement;
pub mod gateway;
pub mod generation;
pub mod generator;
pub mod reconciler;
pub mod signature;

pub use billing::{BillingService, BillingSettings, CheckoutResponse};
pub use entitlement::{can_generate, CreditSource, Entitlement};
pub use gateway::{GatewayError, PaymentGateway, RazorpayClient};
pub use generation::{GenerationResult, GenerationService};
pub use generator::{GeminiGenerator, GeneratorError, ScriptGenerator, ScriptPrompt};
pub use reconciler::{PaymentReconciler, PaymentTransition, ReconcileOutcome};
