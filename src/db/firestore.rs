// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed account ledger.
//!
//! Every write runs in a Firestore read-write transaction: the account
//! document is read inside the transaction, so a concurrent commit on the
//! same document aborts ours and `run_transaction` retries against fresh
//! data. That is what makes "decrement where balance > 0" atomic here.

use crate::db::{apply_to_account, collections, LedgerStore, LedgerUpdate, UpdateOutcome};
use crate::error::AppError;
use crate::models::{Account, LedgerGuard, LedgerMutation};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use futures_util::FutureExt;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::LedgerWriteFailed(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::LedgerWriteFailed(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::LedgerWriteFailed("Database not connected (offline mode)".to_string())
        })
    }

    /// Read-modify-write one account inside a transaction.
    ///
    /// The document is only written when it was just created or when a
    /// mutation actually changed it.
    async fn transact(
        &self,
        identity: &str,
        display_name: Option<&str>,
        guard: Option<LedgerGuard>,
        mutations: Vec<LedgerMutation>,
    ) -> Result<LedgerUpdate, AppError> {
        let client = self.get_client()?;
        let doc_id = document_id(identity);
        let identity = identity.to_string();
        let display_name = display_name.map(String::from);

        client
            .run_transaction(|db, transaction| {
                let doc_id = doc_id.clone();
                let identity = identity.clone();
                let display_name = display_name.clone();
                let guard = guard.clone();
                let mutations = mutations.clone();

                async move {
                    let current: Option<Account> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::ACCOUNTS)
                        .obj()
                        .one(&doc_id)
                        .await?;

                    let created = current.is_none();
                    let mut account = current.unwrap_or_else(|| {
                        let now = now_rfc3339();
                        Account::new_with_starter_grant(&identity, display_name.as_deref(), &now)
                    });

                    let outcome = apply_to_account(&mut account, guard.as_ref(), &mutations);

                    if created || outcome == UpdateOutcome::Applied {
                        db.fluent()
                            .update()
                            .in_col(collections::ACCOUNTS)
                            .document_id(&doc_id)
                            .object(&account)
                            .add_to_transaction(transaction)?;
                    }

                    Ok(LedgerUpdate { account, outcome })
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::LedgerWriteFailed(format!("Account transaction failed: {}", e)))
    }
}

/// Document ID for an identity (emails may contain characters Firestore
/// treats specially, such as `/`).
fn document_id(identity: &str) -> String {
    urlencoding::encode(identity).into_owned()
}

#[async_trait]
impl LedgerStore for FirestoreDb {
    async fn get_account(
        &self,
        identity: &str,
        display_name: Option<&str>,
    ) -> Result<Account, AppError> {
        let existing: Option<Account> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACCOUNTS)
            .obj()
            .one(&document_id(identity))
            .await
            .map_err(|e| AppError::LedgerWriteFailed(e.to_string()))?;

        if let Some(account) = existing {
            return Ok(account);
        }

        // Lazily create inside a transaction so two first requests agree on one row
        let update = self.transact(identity, display_name, None, Vec::new()).await?;
        tracing::info!(identity, "Account created with starter grant");
        Ok(update.account)
    }

    async fn apply(
        &self,
        identity: &str,
        guard: Option<LedgerGuard>,
        mutations: Vec<LedgerMutation>,
    ) -> Result<LedgerUpdate, AppError> {
        self.transact(identity, None, guard, mutations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_encodes_slashes() {
        assert_eq!(document_id("a/b@example.com"), "a%2Fb%40example.com");
    }

    #[tokio::test]
    async fn test_offline_mock_reports_ledger_failure() {
        let db = FirestoreDb::new_mock();
        let err = db
            .apply("a@example.com", None, vec![LedgerMutation::DebitOneTime])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LedgerWriteFailed(_)));
    }
}
