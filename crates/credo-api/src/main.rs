//! Service entrypoint: configuration, collaborator wiring, store
//! rehydration and the axum server loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use credo_api::db::wallet_nonces::PgNonceStore;
use credo_api::state::load_signing_key;
use credo_api::{db, AppConfig, AppState, HttpPushNotifier};
use credo_ledger::{InMemoryNonceStore, JsonRpcChainProvider, NonceManager, NonceStore};
use credo_verify::HttpRegistrar;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(?config, "starting credo-api");

    let signing_key = load_signing_key()?;

    let registrar_url = config
        .registrar_url
        .clone()
        .ok_or("REGISTRAR_URL must be set")?;
    let registrar = Arc::new(HttpRegistrar::new(registrar_url)?);

    let pool = db::init_pool(config.database_url.as_deref()).await?;

    // Nonce counters live in Postgres when the mirror is configured, so
    // multiple instances share one counter per address.
    let nonce_store: Arc<dyn NonceStore> = match &pool {
        Some(pool) => Arc::new(PgNonceStore::new(pool.clone())),
        None => Arc::new(InMemoryNonceStore::new()),
    };
    let nonces = match &config.chain_rpc_url {
        Some(url) => NonceManager::init(
            config.wallet_address.clone(),
            Some(nonce_store),
            Arc::new(JsonRpcChainProvider::new(url.clone())?),
        ),
        None => None,
    };

    let notifier = Arc::new(HttpPushNotifier::new()?);
    let state = AppState::new(
        config.clone(),
        registrar.clone(),
        registrar,
        signing_key,
        notifier,
        nonces,
        pool.clone(),
    )?;

    if let Some(pool) = &pool {
        let exchanges = db::exchanges::load_all(pool).await?;
        let offers = db::offers::load_all(pool).await?;
        info!(
            exchanges = exchanges.len(),
            offers = offers.len(),
            "rehydrating stores from Postgres mirror"
        );
        for exchange in exchanges {
            state.machine.store().insert(exchange.id, exchange);
        }
        for offer in offers {
            state.offers.insert(offer.id, offer);
        }
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, credo_api::app(state)).await?;
    Ok(())
}
