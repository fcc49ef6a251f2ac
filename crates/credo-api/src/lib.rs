//! # credo-api — Credential Exchange HTTP Service
//!
//! Axum service exposing the exchange lifecycle, offer submission,
//! credential inspection and disclosure-template management.
//!
//! Routing is split by audience:
//!
//! - holder-facing exchange routes and health probes are open
//! - vendor/verifier routes sit behind bearer authentication
//!
//! The OpenAPI document is served at `/openapi.json` alongside the
//! protected routes.

use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod db;
pub mod error;
pub mod openapi;
pub mod push;
pub mod routes;
pub mod state;

pub use auth::{auth_middleware, AuthConfig};
pub use error::AppError;
pub use push::HttpPushNotifier;
pub use state::{AppConfig, AppState, ConfigError};

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let protected = Router::new()
        .merge(routes::offers::router())
        .merge(routes::inspection::router())
        .merge(routes::disclosures::router())
        .merge(openapi::router())
        .layer(from_fn(auth_middleware))
        .layer(Extension(auth_config));

    let open = routes::exchanges::router();

    let health = Router::new()
        .route("/health/liveness", get(|| async { "ok" }))
        .route("/health/readiness", get(|| async { "ready" }));

    Router::new()
        .merge(protected)
        .merge(open)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
