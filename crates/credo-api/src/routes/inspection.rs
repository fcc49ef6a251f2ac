//! # Credential Inspection API
//!
//! Relying parties submit presented credentials for verification. Every
//! submitted credential gets a result entry; no credential's failure
//! blocks another's. When the submission belongs to a disclosure
//! exchange the exchange is driven through its presentation states as a
//! side effect.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use credo_core::ExchangeId;
use credo_exchange::{ExchangeMachine, ExchangeState, PushDelegate};
use credo_verify::{check_payment_requirement, verify_credentials, CredentialCheckResult, RawCredential};

use crate::error::AppError;
use crate::state::AppState;

/// A credential-inspection request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InspectionRequest {
    /// The presented credentials, each with a caller-assigned id.
    #[schema(value_type = Vec<Object>)]
    pub raw_credentials: Vec<RawCredential>,
    /// The disclosure exchange this presentation answers, if any.
    pub exchange_id: Option<Uuid>,
    /// Payment voucher covering voucher-gated credential types.
    pub voucher: Option<Value>,
    /// Replacement push delegate for the exchange.
    #[schema(value_type = Option<Object>)]
    pub push_data: Option<PushDelegate>,
}

/// Per-credential verification results, in submission order.
#[derive(Debug, Serialize, Deserialize)]
pub struct InspectionResponse {
    /// One entry per submitted credential.
    pub credentials: Vec<CredentialCheckResult>,
}

/// Build the inspection router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/inspection/check-credentials", post(check_credentials))
}

/// POST /v1/inspection/check-credentials — Verify presented credentials.
#[utoipa::path(
    post,
    path = "/v1/inspection/check-credentials",
    request_body = InspectionRequest,
    responses(
        (status = 200, description = "Per-credential check results"),
        (status = 402, description = "A voucher-gated type was checked without a voucher", body = crate::error::ErrorBody),
        (status = 404, description = "Exchange not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid exchange state", body = crate::error::ErrorBody),
    ),
    tag = "inspection"
)]
pub(crate) async fn check_credentials(
    State(state): State<AppState>,
    Json(req): Json<InspectionRequest>,
) -> Result<Json<InspectionResponse>, AppError> {
    let exchange_id = req.exchange_id.map(ExchangeId::from_uuid);

    if let Some(exchange_id) = &exchange_id {
        let exchange = state.machine.get(exchange_id)?;
        ExchangeMachine::ensure_exchange_state_valid(&exchange, "exchange_invalid")?;
        if let Some(delegate) = req.push_data.clone() {
            state.machine.store().update(exchange_id, |exchange| {
                exchange.push_delegate = Some(delegate);
            });
        }
        state
            .machine
            .add_state(exchange_id, ExchangeState::PresentationReceived, None)
            .await?;
    }

    let (results, metadata_by_type) = verify_credentials(
        &req.raw_credentials,
        state.resolver.as_ref(),
        state.registry.as_ref(),
    )
    .await;

    check_payment_requirement(&results, req.voucher.is_some(), &metadata_by_type)?;

    let all_passed = !results.is_empty()
        && results
            .iter()
            .all(|result| result.credential_checks.all_passed());

    if let Some(exchange_id) = &exchange_id {
        // Only a fully passing presentation advances the exchange; a
        // failed one stays at PRESENTATION_RECEIVED for resubmission.
        if all_passed {
            state
                .machine
                .add_state(exchange_id, ExchangeState::PresentationVerified, None)
                .await?;
            let completed = state
                .machine
                .add_state(exchange_id, ExchangeState::Complete, None)
                .await?;
            state.mirror_exchange(&completed);
        }
        info!(%exchange_id, checked = results.len(), all_passed,
              "presentation inspected");
    }

    Ok(Json(InspectionResponse {
        credentials: results,
    }))
}
