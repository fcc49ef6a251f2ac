#![deny(missing_docs)]

//! # credo-verify — Credential Verification and Subject Binding
//!
//! Everything the operator needs to check credentials and bind holder
//! identities:
//!
//! - [`token`] — the compact three-part EdDSA token codec used for both
//!   proof-of-possession tokens and issued credentials, plus the
//!   [`PublicJwk`][token::PublicJwk] key representation and its RFC 7638
//!   thumbprint.
//! - [`resolve`] — the collaborator seams: [`DidResolver`][resolve::DidResolver]
//!   and [`IssuerRegistry`][resolve::IssuerRegistry] async traits and the
//!   document types they return.
//! - [`registrar`] — the HTTP implementation of both collaborator traits
//!   against a registrar service.
//! - [`proof`] — the proof-of-possession ladder: verifies a holder's
//!   signed token against the exchange challenge and derives the
//!   credential subject identity from it.
//! - [`pipeline`] — per-credential verification. One result entry per
//!   input, always; no credential's failure blocks another's.

pub mod pipeline;
pub mod proof;
pub mod registrar;
pub mod resolve;
pub mod token;

pub use pipeline::{
    check_payment_requirement, verify_credentials, CheckResult, CredentialCheckResult,
    CredentialChecks, PaymentRequiredError, RawCredential,
};
pub use proof::{resolve_subject, Proof, ProofError, ProofParams, SubjectBinding};
pub use registrar::HttpRegistrar;
pub use resolve::{
    CredentialTypeMetadata, DidDocument, DidResolver, IssuerRegistry, ResolutionError,
    VerificationMethod, VerifiedProfile,
};
pub use token::{sign_claims, DecodedToken, PublicJwk, TokenError, TokenHeader};
