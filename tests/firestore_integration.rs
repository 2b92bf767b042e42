// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with FIRESTORE_EMULATOR_HOST pointing at a local emulator.
//!
//! The emulator provides a clean state for each test run.

use forgescript::db::{LedgerStore, UpdateOutcome};
use forgescript::models::{LedgerGuard, LedgerMutation, Plan, SubscriptionStatus};
use std::sync::Arc;

mod common;
use common::test_db;

/// Generate a unique identity for test isolation.
fn unique_identity() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("user{}@example.com", nanos)
}

// ═══════════════════════════════════════════════════════════════════════════
// ACCOUNT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_account_created_with_starter_grant() {
    require_emulator!();

    let db = test_db().await;
    let identity = unique_identity();

    let account = db.get_account(&identity, Some("Test User")).await.unwrap();
    assert_eq!(account.identity, identity);
    assert_eq!(account.plan, Plan::Free);
    assert_eq!(account.one_time_credits, 3);
    assert_eq!(account.display_name.as_deref(), Some("Test User"));

    // Second read returns the stored row, not a fresh grant
    db.apply(&identity, None, vec![LedgerMutation::DebitOneTime])
        .await
        .unwrap();
    let again = db.get_account(&identity, None).await.unwrap();
    assert_eq!(again.one_time_credits, 2);

    println!("✓ Account created and verified: {}", identity);
}

#[tokio::test]
async fn test_subscription_lifecycle() {
    require_emulator!();

    let db = test_db().await;
    let identity = unique_identity();

    let update = db
        .apply(
            &identity,
            None,
            vec![
                LedgerMutation::SetPlan {
                    plan: Plan::Pro,
                    monthly_allotment: 50,
                    reset_at: Some("2026-01-01T00:00:00Z".to_string()),
                },
                LedgerMutation::SetSubscription {
                    subscription_ref: "sub_1".to_string(),
                    status: SubscriptionStatus::Active,
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(update.outcome, UpdateOutcome::Applied);

    // Completion for another subscription is rejected by the guard
    let stale = db
        .apply(
            &identity,
            Some(LedgerGuard::SubscriptionIs("sub_0".to_string())),
            vec![LedgerMutation::ClearSubscription {
                status: SubscriptionStatus::Expired,
            }],
        )
        .await
        .unwrap();
    assert_eq!(stale.outcome, UpdateOutcome::GuardRejected);
    assert_eq!(stale.account.subscription_ref.as_deref(), Some("sub_1"));

    let done = db
        .apply(
            &identity,
            Some(LedgerGuard::SubscriptionIs("sub_1".to_string())),
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
        )
        .await
        .unwrap();
    assert_eq!(done.outcome, UpdateOutcome::Applied);

    let stored = db.get_account(&identity, None).await.unwrap();
    assert_eq!(stored.plan, Plan::Free);
    assert_eq!(stored.subscription_status, SubscriptionStatus::Expired);
    assert!(stored.subscription_ref.is_none());

    println!("✓ Subscription lifecycle verified: {}", identity);
}

#[tokio::test]
async fn test_grant_key_recorded() {
    require_emulator!();

    let db = test_db().await;
    let identity = unique_identity();
    let grant = LedgerMutation::GrantOneTime {
        amount: 10,
        grant_key: "pay_abc".to_string(),
    };

    let first = db.apply(&identity, None, vec![grant.clone()]).await.unwrap();
    assert_eq!(first.outcome, UpdateOutcome::Applied);
    assert_eq!(first.account.one_time_credits, 13);

    let second = db.apply(&identity, None, vec![grant]).await.unwrap();
    assert_eq!(second.outcome, UpdateOutcome::Unchanged);
    assert_eq!(second.account.one_time_credits, 13);
}

// ═══════════════════════════════════════════════════════════════════════════
// CONCURRENCY TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_concurrent_debits_floor_at_zero() {
    require_emulator!();

    let db = Arc::new(test_db().await);
    let identity = unique_identity();
    db.get_account(&identity, None).await.unwrap();

    let mut handles = vec![];
    for _ in 0..8 {
        let db = db.clone();
        let identity = identity.clone();
        handles.push(tokio::spawn(async move {
            db.apply(&identity, None, vec![LedgerMutation::DebitOneTime])
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if let Ok(update) = handle.await.unwrap() {
            if update.outcome == UpdateOutcome::Applied {
                applied += 1;
            }
        }
    }

    let stored = db.get_account(&identity, None).await.unwrap();
    assert_eq!(stored.one_time_credits, 3 - applied);
    assert!(applied <= 3);

    println!("✓ Concurrent debits applied={} for {}", applied, identity);
}
