// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory ledger for tests and local development.
//!
//! Each account lives in a `DashMap` shard; holding the entry guard is the
//! atomic section for a read-modify-write.

use crate::db::{apply_to_account, LedgerStore, LedgerUpdate};
use crate::error::AppError;
use crate::models::{Account, LedgerGuard, LedgerMutation};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory account store.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    accounts: Arc<DashMap<String, Account>>,
    /// When set, every write fails (simulates a storage outage).
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account row directly.
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.identity.clone(), account);
    }

    /// Current row, without creating it.
    pub fn snapshot(&self, identity: &str) -> Option<Account> {
        self.accounts.get(identity).map(|entry| entry.value().clone())
    }

    /// Make subsequent writes fail with `LedgerWriteFailed`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::LedgerWriteFailed(
                "ledger unavailable (simulated)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn get_account(
        &self,
        identity: &str,
        display_name: Option<&str>,
    ) -> Result<Account, AppError> {
        if let Some(existing) = self.accounts.get(identity) {
            return Ok(existing.value().clone());
        }

        self.check_writable()?;
        let now = now_rfc3339();
        let entry = self
            .accounts
            .entry(identity.to_string())
            .or_insert_with(|| Account::new_with_starter_grant(identity, display_name, &now));
        Ok(entry.value().clone())
    }

    async fn apply(
        &self,
        identity: &str,
        guard: Option<LedgerGuard>,
        mutations: Vec<LedgerMutation>,
    ) -> Result<LedgerUpdate, AppError> {
        self.check_writable()?;

        let now = now_rfc3339();
        let mut entry = self
            .accounts
            .entry(identity.to_string())
            .or_insert_with(|| Account::new_with_starter_grant(identity, None, &now));

        let outcome = apply_to_account(entry.value_mut(), guard.as_ref(), &mutations);

        Ok(LedgerUpdate {
            account: entry.value().clone(),
            outcome,
        })
    }
}
