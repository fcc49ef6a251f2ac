//! # credo-ledger -- Transaction-nonce management for anchored operations
//!
//! Credential operations that anchor state on a ledger must submit
//! transactions with strictly increasing nonces per sending address.
//! This crate keeps the nonce counter for each operator address:
//! seeding it from the chain's pending transaction count, handing out
//! monotonically increasing values under concurrency, and supporting
//! reset and guarded rollback when submissions fail.
//!
//! The counter lives behind the [`NonceStore`] trait so deployments can
//! choose an in-memory store (single instance) or a database-backed one
//! (shared across instances).

#![deny(missing_docs)]

pub mod nonce;
pub mod provider;

pub use nonce::{InMemoryNonceStore, NonceError, NonceManager, NonceRecord, NonceStore};
pub use provider::{ChainProvider, JsonRpcChainProvider, ProviderError};
