// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ForgeScript API Server
//!
//! Generates short-form video scripts, metered by a per-account credit
//! ledger that is fed by Razorpay subscriptions and credit-pack orders.

use forgescript::{
    config::Config,
    db::{FirestoreDb, LedgerStore},
    services::{GeminiGenerator, PaymentGateway, RazorpayClient, ScriptGenerator},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting ForgeScript API");

    // Initialize Firestore ledger
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");
    let ledger: Arc<dyn LedgerStore> = Arc::new(db);

    let generator: Arc<dyn ScriptGenerator> = Arc::new(GeminiGenerator::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));
    tracing::info!(
        model = %config.gemini_model,
        timeout_secs = config.generation_timeout.as_secs(),
        "Script generator initialized"
    );

    let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayClient::new(
        config.razorpay_key_id.clone(),
        config.razorpay_key_secret.clone(),
    ));
    tracing::info!("Payment gateway client initialized");

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), ledger, generator, gateway));

    // Build router
    let app = forgescript::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("forgescript=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
