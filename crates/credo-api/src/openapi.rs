//! # OpenAPI Document
//!
//! Generated from the `#[utoipa::path]` annotations on the route
//! handlers and served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::{ErrorBody, ErrorDetail};
use crate::routes;
use crate::state::AppState;

/// The service's OpenAPI description.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "credo-api",
        description = "Credential exchange and verification service",
    ),
    paths(
        routes::exchanges::request_exchange,
        routes::exchanges::finalize_exchange,
        routes::offers::submit_offer,
        routes::offers::complete_offers,
        routes::inspection::check_credentials,
        routes::disclosures::create_disclosure,
        routes::disclosures::get_disclosure,
    ),
    components(schemas(
        ErrorBody,
        ErrorDetail,
        routes::exchanges::FinalizeRequest,
        routes::inspection::InspectionRequest,
        routes::disclosures::NewDisclosure,
    )),
    tags(
        (name = "exchanges", description = "Holder-facing exchange lifecycle"),
        (name = "offers", description = "Vendor offer delivery"),
        (name = "inspection", description = "Credential verification"),
        (name = "disclosures", description = "Disclosure request templates"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert!(paths.contains(&"/v1/exchanges/request".to_string()));
        assert!(paths.contains(&"/v1/exchanges/{exchange_id}/finalize".to_string()));
        assert!(paths.contains(&"/v1/exchanges/{exchange_id}/offers".to_string()));
        assert!(paths.contains(&"/v1/exchanges/{exchange_id}/offers/complete".to_string()));
        assert!(paths.contains(&"/v1/inspection/check-credentials".to_string()));
        assert!(paths.contains(&"/v1/disclosures".to_string()));
        assert!(paths.contains(&"/v1/disclosures/{disclosure_id}".to_string()));
    }

    #[test]
    fn document_serializes() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("\"openapi\""));
        assert!(json.contains("errorCode"));
    }
}
