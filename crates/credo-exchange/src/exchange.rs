//! # Exchange Document
//!
//! One handshake instance between the operator and a holder wallet.
//!
//! ## Event-Log-as-State
//!
//! The exchange does not store a mutable `state` field. It stores an
//! append-only `events` log of `{state, timestamp}` pairs; the current
//! state is the last event (`NEW` when the log is empty). The log is the
//! authoritative history, and the projection cannot drift from it.
//!
//! ## Transitions
//!
//! ```text
//! ISSUING:
//! NEW ──▶ CREDENTIAL_MANIFEST_REQUESTED ──▶ OFFERS_RECEIVED ──▶ CLAIMING_IN_PROGRESS ──▶ COMPLETE
//!                      │
//!                      └──▶ NO_OFFERS_RECEIVED ──▶ COMPLETE
//!
//! DISCLOSURE:
//! NEW ──▶ DISCLOSURE_REQUESTED ──▶ PRESENTATION_RECEIVED ──▶ PRESENTATION_VERIFIED ──▶ COMPLETE
//! ```
//!
//! `UNEXPECTED_ERROR` is terminal and reachable from any non-terminal
//! state. `COMPLETE` and `UNEXPECTED_ERROR` have no outgoing transitions:
//! a terminal exchange is immutable.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use credo_core::{DisclosureId, ExchangeId, Timestamp};

/// The kind of handshake an exchange represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeType {
    /// The operator issues credentials to the holder.
    #[serde(rename = "ISSUING")]
    Issuing,
    /// The holder presents credentials for verification.
    #[serde(rename = "DISCLOSURE")]
    Disclosure,
}

impl ExchangeType {
    /// The canonical string name of this exchange type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issuing => "ISSUING",
            Self::Disclosure => "DISCLOSURE",
        }
    }
}

impl std::fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lifecycle state of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeState {
    /// Exchange created, no request served yet.
    #[serde(rename = "NEW")]
    New,
    /// The holder requested the credential manifest (issuing path).
    #[serde(rename = "CREDENTIAL_MANIFEST_REQUESTED")]
    CredentialManifestRequested,
    /// The vendor delivered at least one offer.
    #[serde(rename = "OFFERS_RECEIVED")]
    OffersReceived,
    /// The vendor signalled completion without delivering offers.
    #[serde(rename = "NO_OFFERS_RECEIVED")]
    NoOffersReceived,
    /// The holder started claiming approved offers.
    #[serde(rename = "CLAIMING_IN_PROGRESS")]
    ClaimingInProgress,
    /// The holder was asked to present credentials (disclosure path).
    #[serde(rename = "DISCLOSURE_REQUESTED")]
    DisclosureRequested,
    /// A presentation was submitted by the holder.
    #[serde(rename = "PRESENTATION_RECEIVED")]
    PresentationReceived,
    /// The submitted presentation passed verification.
    #[serde(rename = "PRESENTATION_VERIFIED")]
    PresentationVerified,
    /// The handshake finished successfully. Terminal.
    #[serde(rename = "COMPLETE")]
    Complete,
    /// An unrecoverable error was recorded. Terminal.
    #[serde(rename = "UNEXPECTED_ERROR")]
    UnexpectedError,
}

impl ExchangeState {
    /// The canonical string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::CredentialManifestRequested => "CREDENTIAL_MANIFEST_REQUESTED",
            Self::OffersReceived => "OFFERS_RECEIVED",
            Self::NoOffersReceived => "NO_OFFERS_RECEIVED",
            Self::ClaimingInProgress => "CLAIMING_IN_PROGRESS",
            Self::DisclosureRequested => "DISCLOSURE_REQUESTED",
            Self::PresentationReceived => "PRESENTATION_RECEIVED",
            Self::PresentationVerified => "PRESENTATION_VERIFIED",
            Self::Complete => "COMPLETE",
            Self::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }

    /// Whether this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::UnexpectedError)
    }

    /// Return the set of valid target states from this state for the
    /// given exchange type.
    ///
    /// `UNEXPECTED_ERROR` is reachable from every non-terminal state and
    /// so appears in every non-terminal row.
    pub fn valid_transitions(&self, exchange_type: ExchangeType) -> &'static [ExchangeState] {
        use ExchangeState::*;
        match (exchange_type, self) {
            (ExchangeType::Issuing, New) => &[CredentialManifestRequested, UnexpectedError],
            (ExchangeType::Issuing, CredentialManifestRequested) => {
                &[OffersReceived, NoOffersReceived, UnexpectedError]
            }
            (ExchangeType::Issuing, OffersReceived) => &[ClaimingInProgress, UnexpectedError],
            (ExchangeType::Issuing, NoOffersReceived) => &[Complete, UnexpectedError],
            (ExchangeType::Issuing, ClaimingInProgress) => &[Complete, UnexpectedError],
            (ExchangeType::Disclosure, New) => &[DisclosureRequested, UnexpectedError],
            (ExchangeType::Disclosure, DisclosureRequested) => {
                &[PresentationReceived, UnexpectedError]
            }
            (ExchangeType::Disclosure, PresentationReceived) => {
                &[PresentationVerified, UnexpectedError]
            }
            (ExchangeType::Disclosure, PresentationVerified) => &[Complete, UnexpectedError],
            _ => &[],
        }
    }

    /// Whether transitioning from this state to `to` is valid for the
    /// given exchange type.
    pub fn can_transition_to(&self, to: ExchangeState, exchange_type: ExchangeType) -> bool {
        self.valid_transitions(exchange_type).contains(&to)
    }
}

impl std::fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the exchange's append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    /// The state entered by this event.
    pub state: ExchangeState,
    /// When the event was appended.
    pub timestamp: Timestamp,
}

/// Async client-notification target attached to an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushDelegate {
    /// Callback URL the client registered.
    pub push_url: String,
    /// Bearer token to present on the callback.
    pub push_token: String,
}

/// One handshake instance.
///
/// Mutated only through [`ExchangeMachine`][crate::machine::ExchangeMachine]
/// operations, each of which is a single atomic store call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    /// Unique exchange identifier.
    pub id: ExchangeId,
    /// Whether this exchange issues or inspects credentials.
    #[serde(rename = "type")]
    pub exchange_type: ExchangeType,
    /// The request template backing a disclosure exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclosure_id: Option<DisclosureId>,
    /// Append-only event log. Current state = last event, `NEW` if empty.
    pub events: Vec<StateEvent>,
    /// Optional async notification target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_delegate: Option<PushDelegate>,
    /// Content hashes of offers already delivered, for de-duplication.
    #[serde(default)]
    pub offer_hashes: BTreeSet<String>,
    /// Credential types involved in this exchange.
    #[serde(default)]
    pub credential_types: Vec<String>,
    /// Identity-matcher values supplied at creation.
    #[serde(default)]
    pub identity_matcher_values: Vec<String>,
    /// Opaque protocol metadata merged in by callers.
    #[serde(default)]
    pub protocol_metadata: serde_json::Map<String, Value>,
    /// Anti-replay challenge handed to the holder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    /// When the challenge was issued, for TTL evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_issued_at: Option<Timestamp>,
    /// When the exchange was created.
    pub created_at: Timestamp,
    /// When the exchange was last mutated.
    pub updated_at: Timestamp,
}

impl Exchange {
    /// The current state: the last event's state, or `NEW` when the log
    /// is empty.
    pub fn current_state(&self) -> ExchangeState {
        self.events
            .last()
            .map(|e| e.state)
            .unwrap_or(ExchangeState::New)
    }

    /// Whether the exchange has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.current_state().is_terminal()
    }
}
