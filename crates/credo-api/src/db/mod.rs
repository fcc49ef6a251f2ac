//! # Postgres Mirror
//!
//! The in-memory stores are authoritative at runtime; Postgres holds a
//! JSONB mirror of exchanges and offers for durability across restarts,
//! plus the shared nonce counters for multi-instance deployments. The
//! schema is applied at startup; all queries are runtime-checked.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

pub mod exchanges;
pub mod offers;
pub mod wallet_nonces;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS exchanges (
    id UUID PRIMARY KEY,
    document JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS offers (
    id UUID PRIMARY KEY,
    exchange_id UUID NOT NULL,
    document JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS offers_exchange_id_idx ON offers (exchange_id);
CREATE TABLE IF NOT EXISTS wallet_nonces (
    address TEXT PRIMARY KEY,
    nonce BIGINT NOT NULL
);
"#;

/// Connect to Postgres and apply the schema. `None` when no URL is
/// configured; the service then runs in-memory only.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        warn!("DATABASE_URL not set, running without a Postgres mirror");
        return Ok(None);
    };

    let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
    ensure_schema(&pool).await?;
    info!("connected to Postgres mirror");
    Ok(Some(pool))
}

async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
