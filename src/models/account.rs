// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account ledger model: one document per identity.
//!
//! The account is the single source of truth for entitlement. All writes go
//! through [`LedgerMutation`]s applied with [`Account::apply`] inside the
//! store's atomic section, so the floor checks below always see the current
//! row rather than a stale read.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One-time credits granted to every new account.
pub const STARTER_CREDITS: u32 = 3;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Elite,
}

impl Plan {
    /// Monthly allotment restored on activation and on each renewal.
    ///
    /// Elite is unmetered, so it carries no allotment at all.
    pub fn renewal_allotment(self) -> u32 {
        match self {
            Plan::Free => 0,
            Plan::Pro => 50,
            Plan::Elite => 0,
        }
    }

    /// Whether generation is metered for this plan.
    pub fn is_metered(self) -> bool {
        !matches!(self, Plan::Elite)
    }

    /// Parse a plan name as written into gateway notes.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            "elite" => Some(Plan::Elite),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Elite => "elite",
        }
    }
}

/// Lifecycle of the recurring subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Active,
    /// Cancelled by the user; still entitled until the gateway completes it.
    Cancelled,
    Expired,
}

/// Stored account record in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Verified identity (email), also the document key
    pub identity: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub plan: Plan,
    /// Purchased, non-expiring balance
    #[serde(default)]
    pub one_time_credits: u32,
    /// Recurring balance, reset on each renewal
    #[serde(default)]
    pub monthly_allotment: u32,
    /// Last allotment reset (RFC3339)
    #[serde(default)]
    pub last_allotment_reset: Option<String>,
    /// Gateway subscription id, present while active or cancelled
    #[serde(default)]
    pub subscription_ref: Option<String>,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    /// Grant keys (gateway payment ids) already credited to this account.
    #[serde(default)]
    pub applied_grants: HashSet<String>,
    pub created_at: String,
}

impl Account {
    /// A fresh account with the starter grant.
    pub fn new_with_starter_grant(identity: &str, display_name: Option<&str>, now: &str) -> Self {
        Self {
            identity: identity.to_string(),
            display_name: display_name.map(String::from),
            plan: Plan::Free,
            one_time_credits: STARTER_CREDITS,
            monthly_allotment: 0,
            last_allotment_reset: None,
            subscription_ref: None,
            subscription_status: SubscriptionStatus::None,
            applied_grants: HashSet::new(),
            created_at: now.to_string(),
        }
    }

    /// Current balances, for display.
    pub fn balances(&self) -> Balances {
        Balances {
            one_time_credits: self.one_time_credits,
            monthly_allotment: self.monthly_allotment,
        }
    }

    /// Check a guard against the current row.
    pub fn satisfies(&self, guard: &LedgerGuard) -> bool {
        match guard {
            LedgerGuard::SubscriptionIs(expected) => {
                self.subscription_ref.as_deref() == Some(expected.as_str())
            }
        }
    }

    /// Apply one mutation in place.
    ///
    /// Returns `false` when the mutation was a no-op: a debit against an
    /// empty balance, a grant whose key was already applied, or a renewal
    /// for a cycle that was already loaded. Debits never
    /// take a balance below zero.
    pub fn apply(&mut self, mutation: &LedgerMutation) -> bool {
        match mutation {
            LedgerMutation::DebitOneTime => match self.one_time_credits.checked_sub(1) {
                Some(left) => {
                    self.one_time_credits = left;
                    true
                }
                None => false,
            },
            LedgerMutation::DebitMonthly => match self.monthly_allotment.checked_sub(1) {
                Some(left) => {
                    self.monthly_allotment = left;
                    true
                }
                None => false,
            },
            LedgerMutation::SetPlan {
                plan,
                monthly_allotment,
                reset_at,
            } => {
                let before = (
                    self.plan,
                    self.monthly_allotment,
                    self.last_allotment_reset.clone(),
                );
                self.plan = *plan;
                self.monthly_allotment = *monthly_allotment;
                self.last_allotment_reset = reset_at.clone();
                before != (self.plan, self.monthly_allotment, self.last_allotment_reset.clone())
            }
            LedgerMutation::RenewAllotment {
                plan,
                monthly_allotment,
                period_start,
            } => {
                if self.plan == *plan
                    && self.last_allotment_reset.as_deref() == Some(period_start.as_str())
                {
                    return false;
                }
                self.plan = *plan;
                self.monthly_allotment = *monthly_allotment;
                self.last_allotment_reset = Some(period_start.clone());
                true
            }
            LedgerMutation::SetSubscription {
                subscription_ref,
                status,
            } => {
                let changed = self.subscription_ref.as_deref() != Some(subscription_ref.as_str())
                    || self.subscription_status != *status;
                self.subscription_ref = Some(subscription_ref.clone());
                self.subscription_status = *status;
                changed
            }
            LedgerMutation::ClearSubscription { status } => {
                let changed =
                    self.subscription_ref.is_some() || self.subscription_status != *status;
                self.subscription_ref = None;
                self.subscription_status = *status;
                changed
            }
            LedgerMutation::GrantOneTime { amount, grant_key } => {
                if !self.applied_grants.insert(grant_key.clone()) {
                    return false;
                }
                self.one_time_credits = self.one_time_credits.saturating_add(*amount);
                true
            }
        }
    }
}

/// Closed set of ledger writes.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerMutation {
    DebitOneTime,
    DebitMonthly,
    /// Last-writer-wins on plan, allotment and reset timestamp.
    SetPlan {
        plan: Plan,
        monthly_allotment: u32,
        reset_at: Option<String>,
    },
    /// Load a billing cycle's allotment, once per `period_start`.
    RenewAllotment {
        plan: Plan,
        monthly_allotment: u32,
        period_start: String,
    },
    /// Last-writer-wins on subscription linkage.
    SetSubscription {
        subscription_ref: String,
        status: SubscriptionStatus,
    },
    /// Drop the subscription linkage, leaving `status` behind.
    ClearSubscription { status: SubscriptionStatus },
    /// Credit `amount` once per `grant_key`.
    GrantOneTime { amount: u32, grant_key: String },
}

/// Precondition checked against the row inside the same atomic section.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerGuard {
    SubscriptionIs(String),
}

/// Balance snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Balances {
    pub one_time_credits: u32,
    pub monthly_allotment: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::new_with_starter_grant("a@example.com", Some("A"), "2026-01-01T00:00:00Z")
    }

    #[test]
    fn test_starter_grant() {
        let acc = account();
        assert_eq!(acc.plan, Plan::Free);
        assert_eq!(acc.one_time_credits, STARTER_CREDITS);
        assert_eq!(acc.monthly_allotment, 0);
        assert_eq!(acc.subscription_status, SubscriptionStatus::None);
        assert!(acc.subscription_ref.is_none());
    }

    #[test]
    fn test_debit_floors_at_zero() {
        let mut acc = account();
        acc.one_time_credits = 1;
        assert!(acc.apply(&LedgerMutation::DebitOneTime));
        assert!(!acc.apply(&LedgerMutation::DebitOneTime));
        assert_eq!(acc.one_time_credits, 0);

        assert!(!acc.apply(&LedgerMutation::DebitMonthly));
        assert_eq!(acc.monthly_allotment, 0);
    }

    #[test]
    fn test_grant_is_keyed() {
        let mut acc = account();
        let grant = LedgerMutation::GrantOneTime {
            amount: 10,
            grant_key: "pay_123".to_string(),
        };
        assert!(acc.apply(&grant));
        assert!(!acc.apply(&grant));
        assert_eq!(acc.one_time_credits, STARTER_CREDITS + 10);
        assert_eq!(acc.applied_grants.len(), 1);

        // Stored as a plain array of keys
        let stored = serde_json::to_value(&acc).unwrap();
        assert_eq!(stored["applied_grants"], serde_json::json!(["pay_123"]));
    }

    #[test]
    fn test_renewal_once_per_cycle() {
        let mut acc = account();
        let renew = LedgerMutation::RenewAllotment {
            plan: Plan::Pro,
            monthly_allotment: 50,
            period_start: "2026-02-01T00:00:00Z".to_string(),
        };
        assert!(acc.apply(&renew));
        assert!(acc.apply(&LedgerMutation::DebitMonthly));

        // Redelivery of the same cycle does not refill
        assert!(!acc.apply(&renew));
        assert_eq!(acc.monthly_allotment, 49);

        assert!(acc.apply(&LedgerMutation::RenewAllotment {
            plan: Plan::Pro,
            monthly_allotment: 50,
            period_start: "2026-03-01T00:00:00Z".to_string(),
        }));
        assert_eq!(acc.monthly_allotment, 50);
        assert_eq!(
            acc.last_allotment_reset.as_deref(),
            Some("2026-03-01T00:00:00Z")
        );
    }

    #[test]
    fn test_subscription_guard() {
        let mut acc = account();
        let guard = LedgerGuard::SubscriptionIs("sub_1".to_string());
        assert!(!acc.satisfies(&guard));

        acc.apply(&LedgerMutation::SetSubscription {
            subscription_ref: "sub_1".to_string(),
            status: SubscriptionStatus::Active,
        });
        assert!(acc.satisfies(&guard));

        acc.apply(&LedgerMutation::ClearSubscription {
            status: SubscriptionStatus::Expired,
        });
        assert!(!acc.satisfies(&guard));
        assert_eq!(acc.subscription_status, SubscriptionStatus::Expired);
    }

    #[test]
    fn test_plan_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Plan::Elite).unwrap(), "\"elite\"");
        assert_eq!(Plan::parse("pro"), Some(Plan::Pro));
        assert_eq!(Plan::parse("credit10"), None);
    }
}
