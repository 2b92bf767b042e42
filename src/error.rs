// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("No credits remaining")]
    InsufficientCredits,

    #[error("Generator returned a malformed script: {0}")]
    GenerationMalformed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Payment signature invalid")]
    SignatureInvalid,

    #[error("Ledger write failed: {0}")]
    LedgerWriteFailed(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Generic message shown for every generation failure.
    pub const GENERATION_FAILED_MESSAGE: &'static str = "Generation failed. Please try again.";

    /// Whether the same request may succeed if sent again.
    ///
    /// For webhooks this is whether the gateway's redelivery can help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::GenerationMalformed(_)
                | AppError::GenerationFailed(_)
                | AppError::LedgerWriteFailed(_)
                | AppError::PaymentGateway(_)
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InsufficientCredits => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                Some("No credits remaining.".to_string()),
            ),
            AppError::GenerationMalformed(msg) | AppError::GenerationFailed(msg) => {
                tracing::error!(error = %msg, "Script generation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "generation_failed",
                    Some(Self::GENERATION_FAILED_MESSAGE.to_string()),
                )
            }
            AppError::SignatureInvalid => (StatusCode::BAD_REQUEST, "signature_invalid", None),
            AppError::LedgerWriteFailed(msg) => {
                tracing::error!(error = %msg, "Ledger write failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "ledger_error", None)
            }
            AppError::PaymentGateway(msg) => {
                tracing::error!(error = %msg, "Payment gateway error");
                (StatusCode::BAD_GATEWAY, "payment_gateway_error", None)
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
