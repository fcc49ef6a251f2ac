//! Offer documents mirrored as JSONB rows.

use sqlx::{PgPool, Row};

use credo_exchange::Offer;

/// Insert or replace the mirrored document for an offer.
pub async fn upsert(pool: &PgPool, offer: &Offer) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO offers (id, exchange_id, document, created_at) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document",
    )
    .bind(offer.id.as_uuid())
    .bind(offer.exchange_id.as_uuid())
    .bind(sqlx::types::Json(offer))
    .bind(offer.created_at.as_datetime())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load every mirrored offer, for store rehydration at startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Offer>, sqlx::Error> {
    let rows = sqlx::query("SELECT document FROM offers")
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| {
            row.try_get::<sqlx::types::Json<Offer>, _>("document")
                .map(|json| json.0)
        })
        .collect()
}
