//! # Disclosure Template API
//!
//! Verifiers register request templates describing what a holder should
//! present; `DISCLOSURE` exchanges are created against them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use credo_core::{DisclosureId, Timestamp};
use credo_exchange::Disclosure;

use crate::error::AppError;
use crate::state::AppState;

/// Payload for registering a disclosure template.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewDisclosure {
    /// Why the presentation is requested, shown to the holder.
    pub purpose: String,
    /// Credential types the holder should present.
    pub credential_types: Vec<String>,
    /// Subject attributes the verifier wants matched.
    #[serde(default)]
    pub identity_matchers: Vec<String>,
    /// How long the request stays valid, in seconds.
    pub duration: Option<i64>,
}

/// Build the disclosure-template router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disclosures", post(create_disclosure))
        .route("/v1/disclosures/:disclosure_id", get(get_disclosure))
}

/// POST /v1/disclosures — Register a disclosure template.
#[utoipa::path(
    post,
    path = "/v1/disclosures",
    request_body = NewDisclosure,
    responses(
        (status = 201, description = "Template stored"),
        (status = 422, description = "No credential types requested", body = crate::error::ErrorBody),
    ),
    tag = "disclosures"
)]
pub(crate) async fn create_disclosure(
    State(state): State<AppState>,
    Json(input): Json<NewDisclosure>,
) -> Result<(StatusCode, Json<Disclosure>), AppError> {
    if input.credential_types.is_empty() {
        return Err(AppError::validation(
            "disclosure must request at least one credential type",
            "disclosure_types_required",
        ));
    }

    let disclosure = Disclosure {
        id: DisclosureId::new(),
        purpose: input.purpose,
        credential_types: input.credential_types,
        identity_matchers: input.identity_matchers,
        duration: input.duration,
        created_at: Timestamp::now(),
    };
    state.disclosures.insert(disclosure.id, disclosure.clone());

    info!(disclosure_id = %disclosure.id, types = ?disclosure.credential_types,
          "disclosure template registered");
    Ok((StatusCode::CREATED, Json(disclosure)))
}

/// GET /v1/disclosures/:disclosure_id — Fetch a disclosure template.
#[utoipa::path(
    get,
    path = "/v1/disclosures/{disclosure_id}",
    params(("disclosure_id" = Uuid, Path, description = "Disclosure ID")),
    responses(
        (status = 200, description = "The template"),
        (status = 404, description = "Unknown template", body = crate::error::ErrorBody),
    ),
    tag = "disclosures"
)]
pub(crate) async fn get_disclosure(
    State(state): State<AppState>,
    Path(disclosure_id): Path<Uuid>,
) -> Result<Json<Disclosure>, AppError> {
    let id = DisclosureId::from_uuid(disclosure_id);
    state.disclosures.get(&id).map(Json).ok_or_else(|| {
        AppError::not_found(format!("disclosure {id} not found"), "disclosure_not_found")
    })
}
