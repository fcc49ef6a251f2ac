#![deny(missing_docs)]

//! # credo-core — Foundational Types for the Credo Exchange Engine
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `serde_json`,
//! `serde_jcs`, `thiserror`, `chrono`, `uuid`, `sha2` and `parking_lot`
//! from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a
//!    distinct type. You cannot pass an [`OfferId`] where an [`ExchangeId`]
//!    is expected.
//!
//! 2. **[`CanonicalBytes`] is the sole path to content hashing.** Every
//!    content hash in the engine flows through `CanonicalBytes::new()`,
//!    which applies null-member stripping and RFC 8785 canonicalization
//!    before hashing. Two structurally identical documents always hash
//!    identically, regardless of field order or absent-vs-null fields.
//!
//! 3. **Atomic store operations.** The [`Store`] expresses every mutation
//!    as a single atomic operation whose filter encodes the invariant
//!    being protected (unique key, conditional update). No caller ever
//!    composes a read-then-write across two store calls.
//!
//! 4. **Structured errors with `thiserror`.** No `Box<dyn Error>`, no
//!    `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod store;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{content_hash, ContentHash, HashType};
pub use error::{CanonicalizationError, CoreError, ValidationError};
pub use identity::{Did, DisclosureId, ExchangeId, LedgerAddress, OfferId};
pub use store::{DuplicateKey, Store};
pub use temporal::Timestamp;
