// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement evaluation: may this account generate, and from which balance?
//!
//! [`can_generate`] is pure. [`debit`] charges exactly the source chosen at
//! gate time; callers must carry that source through the generation call
//! instead of re-evaluating afterwards.

use crate::db::{LedgerStore, UpdateOutcome};
use crate::error::AppError;
use crate::models::{Account, Balances, LedgerMutation};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Balance a generation is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum CreditSource {
    Monthly,
    #[serde(rename = "onetime")]
    OneTime,
    /// Elite plan: metering bypassed.
    Unlimited,
}

impl CreditSource {
    /// The ledger write that charges one unit, if metered.
    pub fn debit_mutation(self) -> Option<LedgerMutation> {
        match self {
            CreditSource::Monthly => Some(LedgerMutation::DebitMonthly),
            CreditSource::OneTime => Some(LedgerMutation::DebitOneTime),
            CreditSource::Unlimited => None,
        }
    }

    /// Remaining balance for this source.
    pub fn remaining(self, balances: Balances) -> Option<u32> {
        match self {
            CreditSource::Monthly => Some(balances.monthly_allotment),
            CreditSource::OneTime => Some(balances.one_time_credits),
            CreditSource::Unlimited => None,
        }
    }
}

/// Gate decision for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    Allowed(CreditSource),
    Denied,
}

impl Entitlement {
    pub fn is_allowed(self) -> bool {
        matches!(self, Entitlement::Allowed(_))
    }

    pub fn source(self) -> Option<CreditSource> {
        match self {
            Entitlement::Allowed(source) => Some(source),
            Entitlement::Denied => None,
        }
    }
}

/// Decide whether `account` may generate now.
///
/// Elite is unlimited regardless of balances. Otherwise the monthly
/// allotment is always spent before purchased one-time credits.
pub fn can_generate(account: &Account) -> Entitlement {
    if !account.plan.is_metered() {
        Entitlement::Allowed(CreditSource::Unlimited)
    } else if account.monthly_allotment > 0 {
        Entitlement::Allowed(CreditSource::Monthly)
    } else if account.one_time_credits > 0 {
        Entitlement::Allowed(CreditSource::OneTime)
    } else {
        Entitlement::Denied
    }
}

/// Outcome of charging one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitReceipt {
    pub source: CreditSource,
    /// Balances after the debit
    pub balances: Balances,
    /// False when the floor stopped the decrement (balance already zero).
    pub charged: bool,
}

impl DebitReceipt {
    /// Remaining balance of the charged source (`None` when unlimited).
    pub fn remaining(&self) -> Option<u32> {
        self.source.remaining(self.balances)
    }
}

/// Charge one unit from `source` with a floor-protected atomic decrement.
pub async fn debit(
    ledger: &dyn LedgerStore,
    identity: &str,
    source: CreditSource,
) -> Result<DebitReceipt, AppError> {
    let Some(mutation) = source.debit_mutation() else {
        let account = ledger.get_account(identity, None).await?;
        return Ok(DebitReceipt {
            source,
            balances: account.balances(),
            charged: false,
        });
    };

    let update = ledger.apply(identity, None, vec![mutation]).await?;

    Ok(DebitReceipt {
        source,
        balances: update.account.balances(),
        charged: update.outcome == UpdateOutcome::Applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryLedger;
    use crate::models::Plan;

    fn account(plan: Plan, monthly: u32, one_time: u32) -> Account {
        let mut acc = Account::new_with_starter_grant("a@example.com", None, "2026-01-01T00:00:00Z");
        acc.plan = plan;
        acc.monthly_allotment = monthly;
        acc.one_time_credits = one_time;
        acc
    }

    #[test]
    fn test_elite_is_unlimited() {
        assert_eq!(
            can_generate(&account(Plan::Elite, 0, 0)),
            Entitlement::Allowed(CreditSource::Unlimited)
        );
    }

    #[test]
    fn test_monthly_preferred() {
        assert_eq!(
            can_generate(&account(Plan::Pro, 5, 10)),
            Entitlement::Allowed(CreditSource::Monthly)
        );
    }

    #[test]
    fn test_one_time_fallback() {
        assert_eq!(
            can_generate(&account(Plan::Free, 0, 3)),
            Entitlement::Allowed(CreditSource::OneTime)
        );
    }

    #[test]
    fn test_denied_when_empty() {
        let decision = can_generate(&account(Plan::Pro, 0, 0));
        assert_eq!(decision, Entitlement::Denied);
        assert!(!decision.is_allowed());
        assert_eq!(decision.source(), None);
    }

    #[test]
    fn test_source_serializes_like_api() {
        assert_eq!(
            serde_json::to_string(&CreditSource::OneTime).unwrap(),
            "\"onetime\""
        );
        assert_eq!(
            serde_json::to_string(&CreditSource::Monthly).unwrap(),
            "\"monthly\""
        );
    }

    #[tokio::test]
    async fn test_debit_charges_chosen_source_only() {
        let ledger = InMemoryLedger::new();
        ledger.insert(account(Plan::Pro, 5, 10));

        let receipt = debit(&ledger, "a@example.com", CreditSource::Monthly)
            .await
            .unwrap();
        assert!(receipt.charged);
        assert_eq!(receipt.balances.monthly_allotment, 4);
        assert_eq!(receipt.balances.one_time_credits, 10);
        assert_eq!(receipt.remaining(), Some(4));
    }

    #[tokio::test]
    async fn test_debit_at_floor_is_noop() {
        let ledger = InMemoryLedger::new();
        ledger.insert(account(Plan::Free, 0, 0));

        let receipt = debit(&ledger, "a@example.com", CreditSource::OneTime)
            .await
            .unwrap();
        assert!(!receipt.charged);
        assert_eq!(receipt.balances.one_time_credits, 0);
    }

    #[tokio::test]
    async fn test_unlimited_debit_leaves_balances() {
        let ledger = InMemoryLedger::new();
        ledger.insert(account(Plan::Elite, 7, 2));

        let receipt = debit(&ledger, "a@example.com", CreditSource::Unlimited)
            .await
            .unwrap();
        assert_eq!(receipt.balances.monthly_allotment, 7);
        assert_eq!(receipt.balances.one_time_credits, 2);
        assert_eq!(receipt.remaining(), None);
    }
}
