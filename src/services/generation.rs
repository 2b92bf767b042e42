// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generation orchestrator.
//!
//! Per request: check entitlement, call the generator, then debit the
//! source chosen at check time. The generator call is not inside any ledger
//! transaction, so a burst of concurrent requests from one account can all
//! pass the check before the first debit lands. The floor-protected debit
//! keeps balances non-negative; the extra generations are accepted.

use crate::db::LedgerStore;
use crate::error::AppError;
use crate::models::{GeneratedScript, GenerationRequest};
use crate::services::entitlement::{self, CreditSource, Entitlement};
use crate::services::generator::{ScriptGenerator, ScriptPrompt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Script plus the balance of the source that paid for it.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    #[serde(flatten)]
    pub script: GeneratedScript,
    /// `None` for unlimited plans
    pub remaining_credits: Option<u32>,
    pub credit_source: CreditSource,
}

/// Service that runs one metered generation.
pub struct GenerationService {
    ledger: Arc<dyn LedgerStore>,
    generator: Arc<dyn ScriptGenerator>,
    timeout: Duration,
}

impl GenerationService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        generator: Arc<dyn ScriptGenerator>,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            generator,
            timeout,
        }
    }

    /// Generate a script for `identity`, charging one unit on success.
    pub async fn generate(
        &self,
        identity: &str,
        display_name: Option<&str>,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, AppError> {
        let topic = request.validated_topic().map_err(AppError::BadRequest)?;

        let account = self.ledger.get_account(identity, display_name).await?;
        let source = match entitlement::can_generate(&account) {
            Entitlement::Allowed(source) => source,
            Entitlement::Denied => {
                tracing::info!(identity, "Generation denied: no credits");
                return Err(AppError::InsufficientCredits);
            }
        };

        tracing::debug!(identity, source = ?source, "Generation admitted");

        let prompt = ScriptPrompt::build(topic, request.tone, request.target_duration_seconds);
        let script = self.run_generator(&prompt).await?;

        let receipt = entitlement::debit(self.ledger.as_ref(), identity, source).await?;
        if source != CreditSource::Unlimited && !receipt.charged {
            tracing::warn!(
                identity,
                source = ?source,
                "Debit found empty balance after generation (concurrent over-admission)"
            );
        }

        tracing::info!(
            identity,
            source = ?source,
            remaining = ?receipt.remaining(),
            "Generation completed"
        );

        Ok(GenerationResult {
            script,
            remaining_credits: receipt.remaining(),
            credit_source: source,
        })
    }

    /// Call the generator under the timeout and decode its reply.
    async fn run_generator(&self, prompt: &ScriptPrompt) -> Result<GeneratedScript, AppError> {
        let raw = match tokio::time::timeout(self.timeout, self.generator.generate(prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(AppError::GenerationFailed(e.to_string())),
            Err(_) => {
                return Err(AppError::GenerationFailed(format!(
                    "generator timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        GeneratedScript::decode(&raw).map_err(AppError::GenerationMalformed)
    }
}
