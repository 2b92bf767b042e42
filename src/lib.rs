// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! ForgeScript: metered short-form script generation
//!
//! This crate provides the backend API that gates script generation on a
//! per-account credit ledger and reconciles payment gateway events into
//! that ledger.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::LedgerStore;
use services::{
    BillingService, BillingSettings, GenerationService, PaymentGateway, PaymentReconciler,
    ScriptGenerator,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub ledger: Arc<dyn LedgerStore>,
    pub generation: GenerationService,
    pub reconciler: PaymentReconciler,
    pub billing: BillingService,
}

impl AppState {
    /// Wire the services around one ledger and the external collaborators.
    pub fn new(
        config: Config,
        ledger: Arc<dyn LedgerStore>,
        generator: Arc<dyn ScriptGenerator>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let generation =
            GenerationService::new(ledger.clone(), generator, config.generation_timeout);

        let reconciler = PaymentReconciler::new(
            ledger.clone(),
            gateway.clone(),
            config.razorpay_webhook_secret.clone(),
            config.razorpay_key_secret.clone(),
        );

        let billing = BillingService::new(
            ledger.clone(),
            gateway,
            BillingSettings {
                key_id: config.razorpay_key_id.clone(),
                pro_plan_id: config.razorpay_pro_plan_id.clone(),
                elite_plan_id: config.razorpay_elite_plan_id.clone(),
                cancel_at_cycle_end: config.cancel_at_cycle_end,
            },
        );

        Self {
            config,
            ledger,
            generation,
            reconciler,
            billing,
        }
    }
}
