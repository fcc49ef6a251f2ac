//! Exchange documents mirrored as JSONB rows.

use sqlx::{PgPool, Row};

use credo_exchange::Exchange;

/// Insert or replace the mirrored document for an exchange.
pub async fn upsert(pool: &PgPool, exchange: &Exchange) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exchanges (id, document, updated_at) VALUES ($1, $2, $3) \
         ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, \
         updated_at = EXCLUDED.updated_at",
    )
    .bind(exchange.id.as_uuid())
    .bind(sqlx::types::Json(exchange))
    .bind(exchange.updated_at.as_datetime())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load every mirrored exchange, for store rehydration at startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Exchange>, sqlx::Error> {
    let rows = sqlx::query("SELECT document FROM exchanges")
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| {
            row.try_get::<sqlx::types::Json<Exchange>, _>("document")
                .map(|json| json.0)
        })
        .collect()
}
