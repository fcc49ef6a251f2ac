//! Shared nonce counters backed by Postgres.
//!
//! Each operation is a single conditional statement, so the accounting
//! invariants hold across service instances exactly as they do for the
//! in-memory store: the counter stays one ahead of the last reserved
//! nonce, inserts lose cleanly to an existing row, and rollbacks only
//! ever move the counter backwards.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use credo_core::LedgerAddress;
use credo_ledger::{NonceError, NonceStore};

/// [`NonceStore`] over the `wallet_nonces` table.
#[derive(Clone)]
pub struct PgNonceStore {
    pool: PgPool,
}

impl PgNonceStore {
    /// Wrap a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_err(err: sqlx::Error) -> NonceError {
    NonceError::Store(err.to_string())
}

#[async_trait]
impl NonceStore for PgNonceStore {
    async fn get_and_increment(
        &self,
        address: &LedgerAddress,
    ) -> Result<Option<u64>, NonceError> {
        let row = sqlx::query(
            "UPDATE wallet_nonces SET nonce = nonce + 1 WHERE address = $1 \
             RETURNING nonce - 1 AS reserved",
        )
        .bind(address.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(|r| r.get::<i64, _>("reserved") as u64))
    }

    async fn insert_new(&self, address: &LedgerAddress, nonce: u64) -> Result<(), NonceError> {
        let result = sqlx::query(
            "INSERT INTO wallet_nonces (address, nonce) VALUES ($1, $2) \
             ON CONFLICT (address) DO NOTHING",
        )
        .bind(address.as_str())
        .bind(nonce as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(NonceError::Duplicate(address.clone()));
        }
        Ok(())
    }

    async fn delete(&self, address: &LedgerAddress) -> Result<(), NonceError> {
        sqlx::query("DELETE FROM wallet_nonces WHERE address = $1")
            .bind(address.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn set_if_greater(
        &self,
        address: &LedgerAddress,
        nonce: u64,
    ) -> Result<bool, NonceError> {
        let result =
            sqlx::query("UPDATE wallet_nonces SET nonce = $2 WHERE address = $1 AND nonce > $2")
                .bind(address.as_str())
                .bind(nonce as i64)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }
}
