// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use forgescript::config::Config;
use forgescript::db::{FirestoreDb, InMemoryLedger};
use forgescript::middleware::auth::create_jwt;
use forgescript::models::payment::GatewayEntity;
use forgescript::models::{Account, PaymentNotes, Plan};
use forgescript::routes::create_router;
use forgescript::services::signature;
use forgescript::services::{
    GatewayError, GeneratorError, PaymentGateway, ScriptGenerator, ScriptPrompt,
};
use forgescript::AppState;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Test doubles ────────────────────────────────────────────

/// How the scripted generator answers.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Well-formed script with this many variations
    Variations(usize),
    /// Raw text returned verbatim
    Raw(String),
    /// Transport error
    Fail,
    /// Sleep before answering with a valid script
    Delay(Duration),
}

/// Generator double that answers from a script and counts calls.
pub struct ScriptedGenerator {
    reply: Mutex<Reply>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedGenerator {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// JSON for a script with `count` complete variations.
pub fn script_json(count: usize) -> String {
    let variations: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "hook": format!("You say tomorrow. Variation {}.", i + 1),
                "struggle": "You open the app. You close it. You open it again.",
                "realization": "You are not tired. You are avoiding.",
                "declaration": "I finish what I start.",
                "cta": "Start or stall.",
                "estimatedDuration": 30
            })
        })
        .collect();

    json!({
        "variations": variations,
        "visualSuggestions": ["Close-up of a phone screen at 2am"],
        "caption": "Stop negotiating with yourself.",
        "hashtags": ["#discipline", "#focus"]
    })
    .to_string()
}

#[async_trait]
impl ScriptGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &ScriptPrompt) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Variations(count) => Ok(script_json(count)),
            Reply::Raw(raw) => Ok(raw),
            Reply::Fail => Err(GeneratorError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
            Reply::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(script_json(3))
            }
        }
    }
}

/// A call made to the recording gateway.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Order {
        amount_minor: u64,
        currency: String,
        email: Option<String>,
        plan: Option<String>,
    },
    Subscription {
        plan_id: String,
        email: Option<String>,
        plan: Option<String>,
    },
    Cancel {
        subscription_id: String,
        cancel_at_cycle_end: bool,
    },
}

/// Billing cycle start the gateway reports for subscriptions (unix seconds).
#[allow(dead_code)]
pub const CYCLE_START: i64 = 1_772_368_205;

/// Gateway double that records calls and can be made to fail.
///
/// Created orders and subscriptions are kept with their notes so they can be
/// fetched back, as from the real gateway.
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    objects: Mutex<HashMap<String, serde_json::Value>>,
    fail: AtomicBool,
}

#[allow(dead_code)]
impl RecordingGateway {
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Status {
                status: 500,
                body: "gateway down".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, call: GatewayCall) -> Result<(), GatewayError> {
        self.check_up()?;
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        Ok(())
    }

    fn store(&self, id: &str, object: serde_json::Value) {
        self.objects.lock().unwrap().insert(id.to_string(), object);
    }

    fn lookup(&self, id: &str) -> Result<GatewayEntity, GatewayError> {
        self.check_up()?;
        let object = self.objects.lock().unwrap().get(id).cloned();
        match object {
            Some(object) => Ok(serde_json::from_value(object).unwrap()),
            None => Err(GatewayError::Status {
                status: 400,
                body: "The id provided does not exist".to_string(),
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        notes: &PaymentNotes,
    ) -> Result<String, GatewayError> {
        self.record(GatewayCall::Order {
            amount_minor,
            currency: currency.to_string(),
            email: notes.email.clone(),
            plan: notes.plan.clone(),
        })?;
        let id = format!("order_{}", self.calls().len());
        self.store(&id, json!({ "id": id, "entity": "order", "notes": notes }));
        Ok(id)
    }

    async fn create_subscription(
        &self,
        plan_id: &str,
        notes: &PaymentNotes,
    ) -> Result<String, GatewayError> {
        self.record(GatewayCall::Subscription {
            plan_id: plan_id.to_string(),
            email: notes.email.clone(),
            plan: notes.plan.clone(),
        })?;
        let id = format!("sub_{}", self.calls().len());
        self.store(
            &id,
            json!({
                "id": id,
                "entity": "subscription",
                "current_start": CYCLE_START,
                "notes": notes
            }),
        );
        Ok(id)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        cancel_at_cycle_end: bool,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::Cancel {
            subscription_id: subscription_id.to_string(),
            cancel_at_cycle_end,
        })
    }

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayEntity, GatewayError> {
        self.lookup(order_id)
    }

    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewayEntity, GatewayError> {
        self.lookup(subscription_id)
    }
}

// ─── Test app ────────────────────────────────────────────────

/// Offline app plus handles on its doubles.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub ledger: Arc<InMemoryLedger>,
    pub generator: Arc<ScriptedGenerator>,
    pub gateway: Arc<RecordingGateway>,
}

/// Create a test app with in-memory ledger and scripted collaborators.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}

/// Same as [`create_test_app`] with a custom config.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let ledger = Arc::new(InMemoryLedger::new());
    let generator = Arc::new(ScriptedGenerator::new(Reply::Variations(3)));
    let gateway = Arc::new(RecordingGateway::default());

    let state = Arc::new(AppState::new(
        config,
        ledger.clone(),
        generator.clone(),
        gateway.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        ledger,
        generator,
        gateway,
    }
}

/// Seed an account with explicit balances.
#[allow(dead_code)]
pub fn seed_account(ledger: &InMemoryLedger, identity: &str, plan: Plan, monthly: u32, one_time: u32) {
    let mut account = Account::new_with_starter_grant(identity, None, "2026-01-01T00:00:00Z");
    account.plan = plan;
    account.monthly_allotment = monthly;
    account.one_time_credits = one_time;
    ledger.insert(account);
}

/// Session token signed with the test config's key.
#[allow(dead_code)]
pub fn test_jwt(identity: &str) -> String {
    create_jwt(
        identity,
        Some("Test User"),
        &Config::test_default().jwt_signing_key,
    )
    .unwrap()
}

/// Authenticated JSON POST.
#[allow(dead_code)]
pub fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Authenticated GET.
#[allow(dead_code)]
pub fn get_authed(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Webhook POST signed with the test webhook secret.
#[allow(dead_code)]
pub fn signed_webhook(body: &serde_json::Value) -> Request<Body> {
    let raw = body.to_string();
    let sig = signature::sign(
        &Config::test_default().razorpay_webhook_secret,
        raw.as_bytes(),
    )
    .unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhook/razorpay")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-razorpay-signature", sig)
        .header("x-razorpay-event-id", "evt_test")
        .body(Body::from(raw))
        .unwrap()
}

/// Subscription event envelope.
#[allow(dead_code)]
pub fn subscription_event(event: &str, identity: &str, sub_id: &str, plan: &str) -> serde_json::Value {
    json!({
        "entity": "event",
        "event": event,
        "created_at": CYCLE_START + 60,
        "payload": {
            "subscription": {
                "entity": {
                    "id": sub_id,
                    "status": "active",
                    "current_start": CYCLE_START,
                    "notes": { "email": identity, "plan": plan }
                }
            }
        }
    })
}

/// `payment.captured` envelope.
#[allow(dead_code)]
pub fn payment_captured(identity: &str, payment_id: &str, plan: &str) -> serde_json::Value {
    json!({
        "entity": "event",
        "event": "payment.captured",
        "created_at": CYCLE_START,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "amount": 50000,
                    "notes": { "email": identity, "plan": plan }
                }
            }
        }
    })
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
