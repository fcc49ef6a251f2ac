//! # Exchange Lifecycle API (holder-facing)
//!
//! ## Endpoints
//!
//! - `GET /v1/exchanges/request` — create or resume an exchange and hand
//!   the holder a signed request object with a fresh challenge
//! - `POST /v1/exchanges/:exchange_id/finalize` — holder approves or
//!   rejects offers; approved offers are signed into credential tokens

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use credo_core::{DisclosureId, ExchangeId, OfferId, Timestamp};
use credo_exchange::{
    presentation_definition, Exchange, ExchangeMachine, ExchangeState, ExchangeType, NewExchange,
    Offer, OfferStatus, PresentationDefinition, PushDelegate,
};
use credo_verify::{resolve_subject, sign_claims, Proof, ProofParams, TokenHeader};

use crate::error::AppError;
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Query parameters of the exchange request endpoint.
#[derive(Debug, Deserialize)]
pub struct ExchangeRequestQuery {
    /// Backing disclosure template. Required for `DISCLOSURE` exchanges.
    pub request_id: Option<Uuid>,
    /// Resume an existing exchange instead of creating one.
    pub exchange_id: Option<Uuid>,
    /// `ISSUING` or `DISCLOSURE`; defaults to `DISCLOSURE`.
    #[serde(rename = "type")]
    pub exchange_type: Option<String>,
    /// Async notification URL for the holder's wallet.
    pub push_url: Option<String>,
    /// Bearer token for push delivery.
    pub push_token: Option<String>,
    /// `json` returns the request object unsigned.
    pub format: Option<String>,
}

/// The request object handed to the holder.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequestResponse {
    /// The exchange to quote on subsequent calls.
    pub exchange_id: String,
    /// Service endpoints the holder should call next, keyed by exchange
    /// type.
    pub metadata: Value,
    /// What the holder should present, when a template backs the
    /// exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_definition: Option<PresentationDefinition>,
    /// Anti-replay challenge to echo in the possession proof.
    pub challenge: String,
}

/// Holder decision over the offers of an exchange.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    /// Offers to convert into signed credentials.
    #[serde(default)]
    pub approved_offer_ids: Vec<Uuid>,
    /// Offers to discard.
    #[serde(default)]
    pub rejected_offer_ids: Vec<Uuid>,
    /// Proof of possession binding the subject identity.
    #[schema(value_type = Option<Object>)]
    pub proof: Option<Proof>,
}

/// Signed credentials produced by finalization.
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeResponse {
    /// One compact token per approved offer.
    pub credentials: Vec<String>,
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the holder-facing exchange router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/exchanges/request", get(request_exchange))
        .route("/v1/exchanges/:exchange_id/finalize", post(finalize_exchange))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /v1/exchanges/request — Create or resume an exchange.
#[utoipa::path(
    get,
    path = "/v1/exchanges/request",
    params(
        ("request_id" = Option<Uuid>, Query, description = "Disclosure template id"),
        ("exchange_id" = Option<Uuid>, Query, description = "Exchange to resume"),
        ("type" = Option<String>, Query, description = "ISSUING or DISCLOSURE"),
        ("format" = Option<String>, Query, description = "json for an unsigned response"),
    ),
    responses(
        (status = 200, description = "Signed request object (compact token) or plain JSON"),
        (status = 404, description = "Unknown disclosure or exchange", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid exchange state", body = crate::error::ErrorBody),
    ),
    tag = "exchanges"
)]
pub(crate) async fn request_exchange(
    State(state): State<AppState>,
    Query(query): Query<ExchangeRequestQuery>,
) -> Result<Response, AppError> {
    let exchange_type = match query.exchange_type.as_deref() {
        Some("ISSUING") => ExchangeType::Issuing,
        Some("DISCLOSURE") | None => ExchangeType::Disclosure,
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "unknown exchange type: {other}"
            )))
        }
    };

    let disclosure = match query.request_id {
        Some(id) => {
            let id = DisclosureId::from_uuid(id);
            Some(state.disclosures.get(&id).ok_or_else(|| {
                AppError::not_found(format!("disclosure {id} not found"), "disclosure_not_found")
            })?)
        }
        None => None,
    };

    let push_delegate = match (query.push_url, query.push_token) {
        (Some(push_url), Some(push_token)) => Some(PushDelegate {
            push_url,
            push_token,
        }),
        _ => None,
    };

    let challenge = fresh_challenge();
    let exchange = match query.exchange_id {
        Some(id) => {
            let id = ExchangeId::from_uuid(id);
            let existing = state.machine.get(&id)?;
            ExchangeMachine::ensure_exchange_state_valid(&existing, "exchange_invalid")?;
            if existing.is_terminal() {
                return Err(AppError::validation(
                    format!("exchange {id} already completed"),
                    "exchange_complete",
                ));
            }
            refresh_exchange(&state.machine, &id, &challenge, push_delegate)
                .ok_or(credo_exchange::ExchangeError::NotFound(id))?
        }
        None => {
            let initial_state = match exchange_type {
                ExchangeType::Issuing => ExchangeState::CredentialManifestRequested,
                ExchangeType::Disclosure => ExchangeState::DisclosureRequested,
            };
            let attrs = NewExchange {
                exchange_type: Some(exchange_type),
                disclosure_id: disclosure.as_ref().map(|d| d.id),
                push_delegate,
                credential_types: disclosure
                    .as_ref()
                    .map(|d| d.credential_types.clone())
                    .unwrap_or_default(),
                identity_matcher_values: disclosure
                    .as_ref()
                    .map(|d| d.identity_matchers.clone())
                    .unwrap_or_default(),
                ..Default::default()
            };
            let created = state.machine.insert_with_initial_state(attrs, &[initial_state])?;
            refresh_exchange(&state.machine, &created.id, &challenge, None)
                .ok_or(credo_exchange::ExchangeError::NotFound(created.id))?
        }
    };

    state.mirror_exchange(&exchange);
    info!(exchange_id = %exchange.id, exchange_type = exchange.exchange_type.as_str(),
          "exchange request issued");

    let response = ExchangeRequestResponse {
        exchange_id: exchange.id.to_string(),
        metadata: endpoint_metadata(&state.config.host_url, &exchange),
        presentation_definition: disclosure.as_ref().map(presentation_definition),
        challenge,
    };

    if query.format.as_deref() == Some("json") {
        return Ok(Json(response).into_response());
    }

    let header = TokenHeader::with_kid(state.operator_did());
    let token = sign_claims(&header, &response, &state.signing_key)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(token.into_response())
}

/// POST /v1/exchanges/:exchange_id/finalize — Convert approved offers
/// into signed credentials.
#[utoipa::path(
    post,
    path = "/v1/exchanges/{exchange_id}/finalize",
    params(("exchange_id" = Uuid, Path, description = "Exchange ID")),
    request_body = FinalizeRequest,
    responses(
        (status = 200, description = "Signed credential tokens"),
        (status = 400, description = "Proof missing or failed verification", body = crate::error::ErrorBody),
        (status = 404, description = "Exchange or offer not found", body = crate::error::ErrorBody),
        (status = 422, description = "Exchange not claimable", body = crate::error::ErrorBody),
    ),
    tag = "exchanges"
)]
pub(crate) async fn finalize_exchange(
    State(state): State<AppState>,
    Path(exchange_id): Path<Uuid>,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, AppError> {
    let exchange_id = ExchangeId::from_uuid(exchange_id);
    let exchange = state.machine.get(&exchange_id)?;
    ExchangeMachine::ensure_exchange_state_valid(&exchange, "exchange_invalid")?;

    let params = ProofParams {
        host_url: state.config.host_url.clone(),
        challenge: exchange.challenge.clone(),
        challenge_issued_at: exchange.challenge_issued_at,
        ttl_secs: state.config.challenge_ttl_secs,
    };
    let binding = resolve_subject(req.proof.as_ref(), &params, state.resolver.as_ref()).await?;

    // Validate the claim set before committing any transition:
    // CLAIMING_IN_PROGRESS cannot be re-entered, so a request naming an
    // unclaimable offer must fail while the exchange is still retryable.
    for offer_id in &req.approved_offer_ids {
        let offer_id = OfferId::from_uuid(*offer_id);
        let claimable = state.offers.get(&offer_id).is_some_and(|offer| {
            offer.exchange_id == exchange_id && offer.status == OfferStatus::Pending
        });
        if !claimable {
            return Err(AppError::not_found(
                format!("offer {offer_id} not found or not claimable on exchange {exchange_id}"),
                "offer_not_found",
            ));
        }
    }

    // The transition is the double-claim gate: exactly one concurrent
    // finalize can move the exchange into CLAIMING_IN_PROGRESS.
    state
        .machine
        .add_state(&exchange_id, ExchangeState::ClaimingInProgress, None)
        .await?;

    let mut credentials = Vec::with_capacity(req.approved_offer_ids.len());
    for offer_id in &req.approved_offer_ids {
        let offer_id = OfferId::from_uuid(*offer_id);
        let offer = match claim_offer(&state, &exchange_id, &offer_id) {
            Ok(offer) => offer,
            Err(err) => {
                // Validated above; losing the offer here means the store
                // changed underneath a committed claim.
                state
                    .machine
                    .record_unexpected_error(&exchange_id, "offer became unclaimable mid-claim")
                    .await?;
                return Err(err);
            }
        };
        state.mirror_offer(&offer);
        match issue_credential(&state, &offer, &binding.id) {
            Ok(token) => credentials.push(token),
            Err(err) => {
                error!(%exchange_id, %offer_id, error = %err, "credential issuance failed");
                state
                    .machine
                    .record_unexpected_error(&exchange_id, "credential issuance failed")
                    .await?;
                return Err(AppError::Internal(err.to_string()));
            }
        }
    }

    for offer_id in &req.rejected_offer_ids {
        let offer_id = OfferId::from_uuid(*offer_id);
        let rejected = state.offers.update_where(
            &offer_id,
            |offer| offer.exchange_id == exchange_id && offer.status == OfferStatus::Pending,
            |offer| offer.status = OfferStatus::Rejected,
        );
        if let Some(offer) = rejected {
            state.mirror_offer(&offer);
        }
    }

    // Reserve an anchoring slot when ledger accounting is configured.
    if let Some(nonces) = &state.nonces {
        match nonces.next_address_nonce().await {
            Ok(nonce) => info!(%exchange_id, nonce, "reserved anchoring nonce"),
            Err(err) => error!(%exchange_id, error = %err, "anchoring nonce reservation failed"),
        }
    }

    let completed = state
        .machine
        .add_state(&exchange_id, ExchangeState::Complete, None)
        .await?;
    state.mirror_exchange(&completed);

    info!(%exchange_id, issued = credentials.len(), "exchange finalized");
    Ok(Json(FinalizeResponse { credentials }))
}

// ── Helpers ─────────────────────────────────────────────────────────

/// 160-bit random challenge, base64url without padding.
fn fresh_challenge() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Stamp a fresh challenge (and optionally a push delegate) onto an
/// exchange. A single store update; not a state transition.
fn refresh_exchange(
    machine: &ExchangeMachine,
    id: &ExchangeId,
    challenge: &str,
    push_delegate: Option<PushDelegate>,
) -> Option<Exchange> {
    machine.store().update(id, |exchange| {
        let now = Timestamp::now();
        exchange.challenge = Some(challenge.to_string());
        exchange.challenge_issued_at = Some(now);
        if let Some(delegate) = push_delegate {
            exchange.push_delegate = Some(delegate);
        }
        exchange.updated_at = now;
    })
}

/// The service endpoints the holder should call next, keyed by exchange
/// type.
fn endpoint_metadata(host_url: &str, exchange: &Exchange) -> Value {
    let base = format!("{host_url}/v1/exchanges/{}", exchange.id);
    match exchange.exchange_type {
        ExchangeType::Issuing => serde_json::json!({
            "ISSUING": {
                "offersEndpoint": format!("{base}/offers"),
                "completeEndpoint": format!("{base}/offers/complete"),
                "finalizeEndpoint": format!("{base}/finalize"),
            }
        }),
        ExchangeType::Disclosure => serde_json::json!({
            "DISCLOSURE": {
                "presentationEndpoint": format!("{host_url}/v1/inspection/check-credentials"),
            }
        }),
    }
}

/// Mark an offer claimed, atomically guarding ownership and status.
fn claim_offer(
    state: &AppState,
    exchange_id: &ExchangeId,
    offer_id: &OfferId,
) -> Result<Offer, AppError> {
    state
        .offers
        .update_where(
            offer_id,
            |offer| offer.exchange_id == *exchange_id && offer.status == OfferStatus::Pending,
            |offer| offer.status = OfferStatus::Claimed,
        )
        .ok_or_else(|| {
            AppError::not_found(
                format!("offer {offer_id} not found or not claimable on exchange {exchange_id}"),
                "offer_not_found",
            )
        })
}

/// Sign one offer into a compact credential token bound to the subject.
fn issue_credential(
    state: &AppState,
    offer: &Offer,
    subject_id: &str,
) -> Result<String, credo_verify::TokenError> {
    let mut credential_subject = offer.credential_subject.clone();
    if let Some(subject) = credential_subject.as_object_mut() {
        subject.insert("id".to_string(), Value::String(subject_id.to_string()));
    }

    let mut vc_types = vec!["VerifiableCredential".to_string()];
    vc_types.extend(offer.credential_type.iter().cloned());

    let claims = serde_json::json!({
        "iss": state.operator_did(),
        "sub": subject_id,
        "jti": offer.id.to_string(),
        "iat": Timestamp::now().as_datetime().timestamp(),
        "vc": {
            "type": vc_types,
            "issuer": offer.issuer,
            "credentialSubject": credential_subject,
            "linkCodeCommitment": offer.link_code_commitment,
            "contentHash": offer.content_hash,
            "relatedResource": offer.related_resource,
            "replaces": offer.replaces,
        },
    });

    let header = TokenHeader::with_kid(state.operator_did());
    sign_claims(&header, &claims, &state.signing_key)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use credo_core::ExchangeId;
    use credo_exchange::{ExchangeState, OfferStatus};
    use credo_verify::{sign_claims, token, PublicJwk, TokenHeader};

    use crate::testing;

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn holder_proof(host_url: &str, challenge: &str) -> serde_json::Value {
        let key = testing::holder_key();
        let jwk = PublicJwk::from_verifying_key(&key.verifying_key());
        let claims = serde_json::json!({"aud": host_url, "nonce": challenge});
        let jwt = sign_claims(&TokenHeader::with_jwk(jwk), &claims, &key).unwrap();
        serde_json::json!({"proof_type": "jwt", "jwt": jwt})
    }

    #[tokio::test]
    async fn create_issuing_exchange_as_json() {
        let state = testing::state();
        let app = crate::app(state.clone());

        let response = app
            .oneshot(get("/v1/exchanges/request?type=ISSUING&format=json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let exchange_id = ExchangeId::parse(body["exchangeId"].as_str().unwrap()).unwrap();
        assert!(!body["challenge"].as_str().unwrap().is_empty());
        assert!(body["metadata"]["ISSUING"]["offersEndpoint"]
            .as_str()
            .unwrap()
            .contains(&exchange_id.to_string()));
        // The request object for an issuing exchange has no definition.
        assert!(body.get("presentationDefinition").is_none());

        let stored = state.machine.get(&exchange_id).unwrap();
        assert_eq!(
            stored.current_state(),
            ExchangeState::CredentialManifestRequested
        );
        assert!(stored.challenge.is_some());
        assert!(stored.challenge_issued_at.is_some());
    }

    #[tokio::test]
    async fn default_response_is_a_signed_token() {
        let state = testing::state();
        let app = crate::app(state.clone());

        let response = app
            .oneshot(get("/v1/exchanges/request?type=ISSUING"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let compact = String::from_utf8(bytes.to_vec()).unwrap();
        let decoded = token::decode(&compact).unwrap();
        decoded
            .verify_signature(&state.signing_key.verifying_key())
            .unwrap();
        assert_eq!(decoded.header.kid.as_deref(), Some(state.operator_did().as_str()));
        assert!(decoded.claims["challenge"].as_str().is_some());
    }

    #[tokio::test]
    async fn disclosure_request_carries_presentation_definition() {
        let state = testing::state();
        let exchange = testing::disclosure_exchange(&state);
        let disclosure_id = exchange.disclosure_id.unwrap();
        let app = crate::app(state);

        let response = app
            .oneshot(get(&format!(
                "/v1/exchanges/request?request_id={disclosure_id}&format=json"
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let descriptors = body["presentationDefinition"]["inputDescriptors"]
            .as_array()
            .unwrap();
        assert_eq!(descriptors[0]["id"], "VerifiedEmployee");
        assert!(body["metadata"]["DISCLOSURE"]["presentationEndpoint"]
            .as_str()
            .unwrap()
            .ends_with("/v1/inspection/check-credentials"));
    }

    #[tokio::test]
    async fn disclosure_request_without_template_is_rejected() {
        let state = testing::state();
        let app = crate::app(state);

        let response = app
            .oneshot(get("/v1/exchanges/request?format=json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        assert_eq!(body["error"]["errorCode"], "missing_attribute");
    }

    #[tokio::test]
    async fn unknown_template_is_404() {
        let state = testing::state();
        let app = crate::app(state);

        let response = app
            .oneshot(get(&format!(
                "/v1/exchanges/request?request_id={}&format=json",
                uuid::Uuid::new_v4()
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["error"]["errorCode"], "disclosure_not_found");
    }

    #[tokio::test]
    async fn resume_rotates_the_challenge() {
        let state = testing::state();
        let exchange = testing::issuing_exchange(&state);
        let app = crate::app(state.clone());

        let first = json_body(
            app.clone()
                .oneshot(get(&format!(
                    "/v1/exchanges/request?type=ISSUING&exchange_id={}&format=json",
                    exchange.id
                )))
                .await
                .unwrap(),
        )
        .await;
        let second = json_body(
            app.oneshot(get(&format!(
                "/v1/exchanges/request?type=ISSUING&exchange_id={}&format=json",
                exchange.id
            )))
            .await
            .unwrap(),
        )
        .await;

        assert_eq!(first["exchangeId"], second["exchangeId"]);
        assert_ne!(first["challenge"], second["challenge"]);
        // The stored exchange carries the latest challenge.
        let stored = state.machine.get(&exchange.id).unwrap();
        assert_eq!(
            stored.challenge.as_deref(),
            second["challenge"].as_str()
        );
    }

    #[tokio::test]
    async fn finalize_without_proof_is_400() {
        let state = testing::state();
        let exchange = testing::issuing_exchange(&state);
        let app = crate::app(state);

        let response = app
            .oneshot(post_json(
                &format!("/v1/exchanges/{}/finalize", exchange.id),
                serde_json::json!({"approvedOfferIds": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["errorCode"], "invalid_or_missing_proof");
    }

    #[tokio::test]
    async fn issuing_flow_end_to_end() {
        let state = testing::state();
        let app = crate::app(state.clone());
        let host_url = state.config.host_url.clone();

        // Holder opens the exchange.
        let request = json_body(
            app.clone()
                .oneshot(get("/v1/exchanges/request?type=ISSUING&format=json"))
                .await
                .unwrap(),
        )
        .await;
        let exchange_id = request["exchangeId"].as_str().unwrap().to_string();
        let challenge = request["challenge"].as_str().unwrap().to_string();

        // Vendor delivers one offer and signals completion.
        let offer = json_body(
            app.clone()
                .oneshot(post_json(
                    &format!("/v1/exchanges/{exchange_id}/offers"),
                    serde_json::json!({
                        "type": ["VerifiedEmployee"],
                        "credentialSubject": {"vendorUserId": "u1"},
                    }),
                ))
                .await
                .unwrap(),
        )
        .await;
        let offer_id = offer["id"].as_str().unwrap().to_string();
        app.clone()
            .oneshot(post_json(
                &format!("/v1/exchanges/{exchange_id}/offers/complete"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        // Holder claims the offer with a possession proof.
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/exchanges/{exchange_id}/finalize"),
                serde_json::json!({
                    "approvedOfferIds": [offer_id],
                    "proof": holder_proof(&host_url, &challenge),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let credentials = body["credentials"].as_array().unwrap();
        assert_eq!(credentials.len(), 1);

        // The issued credential is operator-signed and subject-bound.
        let decoded = token::decode(credentials[0].as_str().unwrap()).unwrap();
        decoded
            .verify_signature(&state.signing_key.verifying_key())
            .unwrap();
        assert_eq!(decoded.claims["iss"], state.operator_did());
        let subject_id = decoded.claims["vc"]["credentialSubject"]["id"]
            .as_str()
            .unwrap();
        assert!(subject_id.starts_with("did:jwk:"));
        assert_eq!(decoded.claims["sub"], subject_id);
        let types = decoded.claims["vc"]["type"].as_array().unwrap();
        assert_eq!(types[0], "VerifiableCredential");
        assert_eq!(types[1], "VerifiedEmployee");
        assert_eq!(
            decoded.claims["vc"]["linkCodeCommitment"]["type"],
            "sha-256"
        );

        // Exchange is terminal, the offer is claimed.
        let stored = ExchangeId::parse(&exchange_id).unwrap();
        assert_eq!(
            state.machine.get(&stored).unwrap().current_state(),
            ExchangeState::Complete
        );
        let claimed = state
            .offers
            .list()
            .into_iter()
            .find(|o| o.id.to_string() == offer_id)
            .unwrap();
        assert_eq!(claimed.status, OfferStatus::Claimed);

        // A second claim attempt loses at the state machine.
        let again = app
            .oneshot(post_json(
                &format!("/v1/exchanges/{exchange_id}/finalize"),
                serde_json::json!({
                    "approvedOfferIds": [],
                    "proof": holder_proof(&host_url, &challenge),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(again).await;
        assert_eq!(body["error"]["errorCode"], "invalid_state_transition");
    }

    #[tokio::test]
    async fn finalize_with_stale_challenge_is_400() {
        let state = testing::state();
        let app = crate::app(state.clone());
        let host_url = state.config.host_url.clone();

        let request = json_body(
            app.clone()
                .oneshot(get("/v1/exchanges/request?type=ISSUING&format=json"))
                .await
                .unwrap(),
        )
        .await;
        let exchange_id = request["exchangeId"].as_str().unwrap().to_string();

        let response = app
            .oneshot(post_json(
                &format!("/v1/exchanges/{exchange_id}/finalize"),
                serde_json::json!({
                    "approvedOfferIds": [],
                    "proof": holder_proof(&host_url, "not-the-challenge"),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["errorCode"], "proof_challenge_mismatch");
    }

    #[tokio::test]
    async fn finalize_with_unknown_offer_leaves_exchange_claimable() {
        let state = testing::state();
        let app = crate::app(state.clone());
        let host_url = state.config.host_url.clone();

        let request = json_body(
            app.clone()
                .oneshot(get("/v1/exchanges/request?type=ISSUING&format=json"))
                .await
                .unwrap(),
        )
        .await;
        let exchange_id = request["exchangeId"].as_str().unwrap().to_string();
        let challenge = request["challenge"].as_str().unwrap().to_string();

        let offer = json_body(
            app.clone()
                .oneshot(post_json(
                    &format!("/v1/exchanges/{exchange_id}/offers"),
                    serde_json::json!({
                        "type": ["VerifiedEmployee"],
                        "credentialSubject": {"vendorUserId": "u1"},
                    }),
                ))
                .await
                .unwrap(),
        )
        .await;
        let offer_id = offer["id"].as_str().unwrap().to_string();
        app.clone()
            .oneshot(post_json(
                &format!("/v1/exchanges/{exchange_id}/offers/complete"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        // Naming an offer the exchange never saw fails before any
        // transition commits.
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/exchanges/{exchange_id}/finalize"),
                serde_json::json!({
                    "approvedOfferIds": [uuid::Uuid::new_v4().to_string()],
                    "proof": holder_proof(&host_url, &challenge),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"]["errorCode"], "offer_not_found");

        let stored = ExchangeId::parse(&exchange_id).unwrap();
        assert_eq!(
            state.machine.get(&stored).unwrap().current_state(),
            ExchangeState::OffersReceived
        );

        // The same exchange and challenge still finalize cleanly.
        let retry = app
            .oneshot(post_json(
                &format!("/v1/exchanges/{exchange_id}/finalize"),
                serde_json::json!({
                    "approvedOfferIds": [offer_id],
                    "proof": holder_proof(&host_url, &challenge),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(retry.status(), StatusCode::OK);
        assert_eq!(
            state.machine.get(&stored).unwrap().current_state(),
            ExchangeState::Complete
        );
    }
}
