//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Every response body carries two codes: `code` names the HTTP error
//! class, `errorCode` is the stable machine-readable condition clients
//! branch on (e.g. `offer_duplicate_content_hash`). Internal error
//! details are never exposed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use credo_exchange::{ExchangeError, OfferBuildError};
use credo_verify::{PaymentRequiredError, ProofError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// HTTP error class (e.g. "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Stable machine-readable condition (e.g. "proof_challenge_expired").
    #[serde(rename = "errorCode")]
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type mapped to HTTP responses.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {message}")]
    NotFound {
        message: String,
        error_code: &'static str,
    },

    /// Request rejected by domain validation (422).
    #[error("validation error: {message}")]
    Validation {
        message: String,
        error_code: &'static str,
    },

    /// Request body or parameters could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Proof of possession was missing, malformed or failed a check
    /// (400). Carries the stable code naming the failed ladder rung.
    #[error("proof rejected: {message}")]
    ProofRejected {
        message: String,
        error_code: &'static str,
    },

    /// A voucher-gated check ran without a voucher (402).
    #[error("payment required: {0}")]
    PaymentRequired(String),

    /// Internal server error (500). Message is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 404 with a stable condition code.
    pub fn not_found(message: impl Into<String>, error_code: &'static str) -> Self {
        Self::NotFound {
            message: message.into(),
            error_code,
        }
    }

    /// 422 with a stable condition code.
    pub fn validation(message: impl Into<String>, error_code: &'static str) -> Self {
        Self::Validation {
            message: message.into(),
            error_code,
        }
    }

    fn status_and_codes(&self) -> (StatusCode, &'static str, &str) {
        match self {
            Self::NotFound { error_code, .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", error_code),
            Self::Validation { error_code, .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", error_code)
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", "bad_request"),
            Self::ProofRejected { error_code, .. } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", error_code)
            }
            Self::PaymentRequired(_) => (
                StatusCode::PAYMENT_REQUIRED,
                "PAYMENT_REQUIRED",
                "payment_required",
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal_error",
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_code) = self.status_and_codes();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                error_code: error_code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ExchangeError> for AppError {
    fn from(err: ExchangeError) -> Self {
        match &err {
            ExchangeError::NotFound(_) => Self::not_found(err.to_string(), "exchange_not_found"),
            ExchangeError::InvalidTransition { .. } => {
                Self::validation(err.to_string(), "invalid_state_transition")
            }
            ExchangeError::InvalidExchange { error_code, .. } => {
                Self::validation(err.to_string(), *error_code)
            }
            ExchangeError::MissingAttribute(_) => {
                Self::validation(err.to_string(), "missing_attribute")
            }
            ExchangeError::DuplicateOfferHash { .. } => {
                Self::validation(err.to_string(), "offer_duplicate_content_hash")
            }
        }
    }
}

impl From<OfferBuildError> for AppError {
    fn from(err: OfferBuildError) -> Self {
        match err {
            OfferBuildError::EmptyCredentialType => {
                Self::validation(err.to_string(), "offer_type_required")
            }
            OfferBuildError::Canonicalization(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ProofError> for AppError {
    fn from(err: ProofError) -> Self {
        let error_code = err.error_code();
        Self::ProofRejected {
            message: err.to_string(),
            error_code,
        }
    }
}

impl From<PaymentRequiredError> for AppError {
    fn from(err: PaymentRequiredError) -> Self {
        Self::PaymentRequired(err.to_string())
    }
}

impl From<credo_core::ValidationError> for AppError {
    fn from(err: credo_core::ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
