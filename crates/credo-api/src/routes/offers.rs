//! # Offer Submission API (vendor-facing)
//!
//! Vendors deliver prepared offers onto an issuing exchange and signal
//! when delivery is done. Submission is content-addressed: a payload
//! whose hash was already registered on the exchange is rejected with a
//! stable `offer_duplicate_content_hash` condition.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;
use uuid::Uuid;

use credo_core::ExchangeId;
use credo_exchange::{build_offer, CredentialRef, Exchange, ExchangeMachine, ExchangeState, Offer, OfferInput};

use crate::error::AppError;
use crate::state::AppState;

/// Build the vendor-facing offer router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/exchanges/:exchange_id/offers", post(submit_offer))
        .route(
            "/v1/exchanges/:exchange_id/offers/complete",
            post(complete_offers),
        )
}

/// POST /v1/exchanges/:exchange_id/offers — Deliver one offer.
#[utoipa::path(
    post,
    path = "/v1/exchanges/{exchange_id}/offers",
    params(("exchange_id" = Uuid, Path, description = "Exchange ID")),
    responses(
        (status = 201, description = "Offer stored"),
        (status = 404, description = "Exchange not found", body = crate::error::ErrorBody),
        (status = 422, description = "Duplicate content hash or invalid payload", body = crate::error::ErrorBody),
    ),
    tag = "offers"
)]
pub(crate) async fn submit_offer(
    State(state): State<AppState>,
    Path(exchange_id): Path<Uuid>,
    Json(input): Json<OfferInput>,
) -> Result<(StatusCode, Json<Offer>), AppError> {
    let exchange_id = ExchangeId::from_uuid(exchange_id);
    let exchange = state.machine.get(&exchange_id)?;
    ExchangeMachine::ensure_exchange_state_valid(&exchange, "exchange_invalid")?;
    if exchange.is_terminal() {
        return Err(AppError::validation(
            format!("exchange {exchange_id} already completed"),
            "exchange_complete",
        ));
    }

    let refs = credential_refs(&state, &exchange);
    let offer = build_offer(input, &refs, &state.tenant, &exchange)?;

    // Registration is the duplicate gate; the offer is only stored once
    // its hash won the slot on the exchange.
    let exchange = state
        .machine
        .register_offer_hash(&exchange_id, &offer.content_hash.value)?;
    state.offers.insert(offer.id, offer.clone());
    state.mirror_exchange(&exchange);
    state.mirror_offer(&offer);

    info!(%exchange_id, offer_id = %offer.id, content_hash = %offer.content_hash.value,
          "offer stored on exchange");
    Ok((StatusCode::CREATED, Json(offer)))
}

/// POST /v1/exchanges/:exchange_id/offers/complete — Signal that the
/// vendor has no more offers to deliver.
#[utoipa::path(
    post,
    path = "/v1/exchanges/{exchange_id}/offers/complete",
    params(("exchange_id" = Uuid, Path, description = "Exchange ID")),
    responses(
        (status = 200, description = "Exchange advanced"),
        (status = 404, description = "Exchange not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid state transition", body = crate::error::ErrorBody),
    ),
    tag = "offers"
)]
pub(crate) async fn complete_offers(
    State(state): State<AppState>,
    Path(exchange_id): Path<Uuid>,
) -> Result<Json<Exchange>, AppError> {
    let exchange_id = ExchangeId::from_uuid(exchange_id);
    let exchange = state.machine.get(&exchange_id)?;
    ExchangeMachine::ensure_exchange_state_valid(&exchange, "exchange_invalid")?;

    let has_offers = state
        .offers
        .list()
        .iter()
        .any(|offer| offer.exchange_id == exchange_id);

    let exchange = if has_offers {
        state
            .machine
            .add_state(&exchange_id, ExchangeState::OffersReceived, None)
            .await?
    } else {
        // The empty branch runs straight to COMPLETE: there is nothing
        // left for the holder to claim.
        state
            .machine
            .add_state(&exchange_id, ExchangeState::NoOffersReceived, None)
            .await?;
        state
            .machine
            .add_state(&exchange_id, ExchangeState::Complete, None)
            .await?
    };

    state.mirror_exchange(&exchange);
    info!(%exchange_id, state = exchange.current_state().as_str(), has_offers,
          "offer delivery completed");
    Ok(Json(exchange))
}

/// Refs map for offer enrichment: every offer already stored on the
/// exchange, keyed by id, hinted with its first credential type.
fn credential_refs(state: &AppState, exchange: &Exchange) -> HashMap<String, CredentialRef> {
    state
        .offers
        .list()
        .into_iter()
        .filter(|offer| offer.exchange_id == exchange.id)
        .map(|offer| {
            (
                offer.id.to_string(),
                CredentialRef {
                    hint: offer.credential_type.first().cloned(),
                    ..Default::default()
                },
            )
        })
        .collect()
}
