//! Per-address transaction-nonce accounting.
//!
//! The counter stored for an address is always one ahead of the last
//! nonce handed out, so `get_and_increment` can atomically reserve the
//! next value. Seeding reads the chain's pending transaction count;
//! when two tasks race to seed the same address, the duplicate-key
//! loser falls back to incrementing the winner's record.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use credo_core::{LedgerAddress, Store};

use crate::provider::{ChainProvider, ProviderError};

/// Failures of nonce accounting.
#[derive(Error, Debug)]
pub enum NonceError {
    /// A record for the address already exists.
    #[error("nonce record already exists for {0}")]
    Duplicate(LedgerAddress),

    /// The backing store failed.
    #[error("nonce store failed: {0}")]
    Store(String),

    /// The chain node could not supply a seed count.
    #[error(transparent)]
    Chain(#[from] ProviderError),
}

/// The stored counter for one address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceRecord {
    /// The sending address.
    pub address: LedgerAddress,
    /// The next nonce to hand out.
    pub nonce: u64,
}

/// Storage seam for nonce counters.
///
/// Every operation is atomic at the store level; the manager never does
/// read-then-write across calls.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Atomically return the stored nonce for the address and advance
    /// the counter by one. `None` when the address has no record.
    async fn get_and_increment(&self, address: &LedgerAddress)
        -> Result<Option<u64>, NonceError>;

    /// Insert a fresh record, failing with [`NonceError::Duplicate`]
    /// when one exists.
    async fn insert_new(&self, address: &LedgerAddress, nonce: u64) -> Result<(), NonceError>;

    /// Delete the record for the address. Deleting a missing record is
    /// not an error.
    async fn delete(&self, address: &LedgerAddress) -> Result<(), NonceError>;

    /// Set the counter to `nonce` only when the stored counter is
    /// strictly greater. Returns whether an update happened.
    async fn set_if_greater(
        &self,
        address: &LedgerAddress,
        nonce: u64,
    ) -> Result<bool, NonceError>;
}

/// Process-local [`NonceStore`] for single-instance deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNonceStore {
    records: Store<LedgerAddress, NonceRecord>,
}

impl InMemoryNonceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn get_and_increment(
        &self,
        address: &LedgerAddress,
    ) -> Result<Option<u64>, NonceError> {
        let reserved: Option<Result<u64, NonceError>> =
            self.records.try_update(address, |record| {
                let current = record.nonce;
                record.nonce += 1;
                Ok(current)
            });
        reserved.transpose()
    }

    async fn insert_new(&self, address: &LedgerAddress, nonce: u64) -> Result<(), NonceError> {
        self.records
            .insert_new(
                address.clone(),
                NonceRecord {
                    address: address.clone(),
                    nonce,
                },
            )
            .map_err(|_| NonceError::Duplicate(address.clone()))
    }

    async fn delete(&self, address: &LedgerAddress) -> Result<(), NonceError> {
        self.records.remove(address);
        Ok(())
    }

    async fn set_if_greater(
        &self,
        address: &LedgerAddress,
        nonce: u64,
    ) -> Result<bool, NonceError> {
        let updated = self.records.update_where(
            address,
            |record| record.nonce > nonce,
            |record| record.nonce = nonce,
        );
        Ok(updated.is_some())
    }
}

/// Hands out transaction nonces for one operator address.
#[derive(Clone)]
pub struct NonceManager {
    address: LedgerAddress,
    store: Arc<dyn NonceStore>,
    chain: Arc<dyn ChainProvider>,
}

impl NonceManager {
    /// Build a manager when both the address and the store are
    /// configured. Deployments without ledger anchoring configure
    /// neither and get `None`.
    pub fn init(
        address: Option<LedgerAddress>,
        store: Option<Arc<dyn NonceStore>>,
        chain: Arc<dyn ChainProvider>,
    ) -> Option<Self> {
        match (address, store) {
            (Some(address), Some(store)) => Some(Self {
                address,
                store,
                chain,
            }),
            _ => {
                debug!("ledger anchoring not configured, nonce manager disabled");
                None
            }
        }
    }

    /// The address this manager accounts for.
    pub fn address(&self) -> &LedgerAddress {
        &self.address
    }

    /// Reserve the next nonce for the address.
    ///
    /// Seeds the counter from the chain when no record exists yet.
    pub async fn next_address_nonce(&self) -> Result<u64, NonceError> {
        if let Some(nonce) = self.store.get_and_increment(&self.address).await? {
            return Ok(nonce);
        }
        self.insert_initial_nonce().await
    }

    /// Seed the counter from the chain's pending transaction count.
    ///
    /// Returns the pending count as the first usable nonce and stores
    /// `count + 1` as the follow-up. When a concurrent seeder won the
    /// insert, defers to its record instead.
    pub async fn insert_initial_nonce(&self) -> Result<u64, NonceError> {
        let count = self.chain.pending_transaction_count(&self.address).await?;
        match self.store.insert_new(&self.address, count + 1).await {
            Ok(()) => {
                info!(address = %self.address, nonce = count, "seeded nonce counter from chain");
                Ok(count)
            }
            Err(NonceError::Duplicate(_)) => {
                // Lost the seeding race. The winner's record is live.
                self.store
                    .get_and_increment(&self.address)
                    .await?
                    .ok_or_else(|| {
                        NonceError::Store("nonce record vanished during seeding".to_string())
                    })
            }
            Err(other) => Err(other),
        }
    }

    /// Discard the stored counter and reseed from the chain.
    pub async fn reset_address_nonce(&self) -> Result<u64, NonceError> {
        self.store.delete(&self.address).await?;
        self.insert_initial_nonce().await
    }

    /// Roll the counter back to `nonce`, only when it would move the
    /// counter backwards. Returns whether the rollback applied.
    pub async fn rollback_address_nonce(&self, nonce: u64) -> Result<bool, NonceError> {
        let applied = self.store.set_if_greater(&self.address, nonce).await?;
        if applied {
            info!(address = %self.address, nonce, "rolled nonce counter back");
        } else {
            debug!(address = %self.address, nonce, "rollback skipped, counter not ahead");
        }
        Ok(applied)
    }
}
