//! Ledger storage layer.
//!
//! [`LedgerStore`] is the only way to read or write an [`Account`]. Every
//! write runs inside the backend's atomic section: the row is re-read, the
//! guard is checked, and the mutations are applied against that fresh copy,
//! so concurrent debits can never drive a balance negative.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::InMemoryLedger;

use crate::error::AppError;
use crate::models::{Account, LedgerGuard, LedgerMutation};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// Account documents (keyed by url-encoded identity)
    pub const ACCOUNTS: &str = "accounts";
}

/// Result of an atomic ledger update.
#[derive(Debug, Clone)]
pub struct LedgerUpdate {
    /// Row as it stands after the update
    pub account: Account,
    pub outcome: UpdateOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// At least one mutation changed the row.
    Applied,
    /// Every mutation was a no-op (empty balance, repeated grant, same value).
    Unchanged,
    /// The guard did not hold; nothing was written.
    GuardRejected,
}

/// Persistent per-identity entitlement ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load the account, creating it with the starter grant if absent.
    async fn get_account(
        &self,
        identity: &str,
        display_name: Option<&str>,
    ) -> Result<Account, AppError>;

    /// Atomically check `guard` and apply `mutations` to one account.
    ///
    /// Creates the account with the starter grant first if it does not
    /// exist. Storage failures surface as [`AppError::LedgerWriteFailed`].
    async fn apply(
        &self,
        identity: &str,
        guard: Option<LedgerGuard>,
        mutations: Vec<LedgerMutation>,
    ) -> Result<LedgerUpdate, AppError>;
}

/// Run a guarded mutation batch against an in-memory copy of the row.
///
/// Shared by every backend so the transition semantics live in one place.
pub(crate) fn apply_to_account(
    account: &mut Account,
    guard: Option<&LedgerGuard>,
    mutations: &[LedgerMutation],
) -> UpdateOutcome {
    if let Some(guard) = guard {
        if !account.satisfies(guard) {
            return UpdateOutcome::GuardRejected;
        }
    }

    let mut changed = false;
    for mutation in mutations {
        changed |= account.apply(mutation);
    }

    if changed {
        UpdateOutcome::Applied
    } else {
        UpdateOutcome::Unchanged
    }
}
