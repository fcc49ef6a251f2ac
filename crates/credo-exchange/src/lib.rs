#![deny(missing_docs)]

//! # credo-exchange — Exchange Lifecycle and Offer Construction
//!
//! Models one credential handshake ("exchange") between the operator and a
//! holder wallet, from the first request through offer delivery, claiming
//! and completion.
//!
//! - [`exchange`] — the exchange document: an append-only log of typed
//!   state events. Current state is a derived projection (the last event),
//!   never a separately mutable field, so the log and the status cannot
//!   drift apart.
//! - [`machine`] — validated transitions over a shared
//!   [`Store`][credo_core::Store], with idempotent terminal re-entry and
//!   best-effort push notification after each committed transition.
//! - [`offer`] — the content-addressed offer record: link code, link-code
//!   commitment, linked-credential references.
//! - [`builder`] — turns a vendor-supplied offer payload into a stored
//!   [`Offer`], enriching references and computing the content hash over
//!   the offer's substantive fields only.
//! - [`disclosure`] — request templates and the presentation definitions
//!   derived from them.

pub mod builder;
pub mod disclosure;
pub mod exchange;
pub mod machine;
pub mod offer;

pub use builder::{build_offer, CredentialRef, OfferBuildError, OfferInput, TenantContext};
pub use disclosure::{presentation_definition, Disclosure, PresentationDefinition};
pub use exchange::{Exchange, ExchangeState, ExchangeType, PushDelegate, StateEvent};
pub use machine::{
    ExchangeError, ExchangeMachine, ExchangePatch, NewExchange, NoopNotifier, PushError,
    PushNotifier,
};
pub use offer::{
    Issuer, IssuerRecord, LinkCode, LinkCodeCommitment, LinkedCredentialRef, Offer, OfferStatus,
    RelatedResource,
};
