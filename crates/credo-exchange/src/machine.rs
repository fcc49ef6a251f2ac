//! # Exchange State Machine
//!
//! Validated, atomic operations over a shared exchange store.
//!
//! Every mutation is a single [`Store::try_update`] call: the transition
//! is validated against the *current* last event and the new event is
//! appended under the same write lock. Resumed exchanges (an externally
//! supplied id) therefore get the same validation as fresh ones, and two
//! concurrent mutations cannot interleave between read and write.
//!
//! Push notification happens after the commit, best-effort: a delivery
//! failure is logged and never rolls back or retries the transition.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use credo_core::{DisclosureId, ExchangeId, Store, Timestamp};

use crate::exchange::{Exchange, ExchangeState, ExchangeType, PushDelegate, StateEvent};

/// Errors from exchange machine operations.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// No exchange exists for the given id.
    #[error("exchange not found: {0}")]
    NotFound(ExchangeId),

    /// The requested transition is not valid from the current state.
    #[error("invalid transition from {from} to {to} for {exchange_type} exchange")]
    InvalidTransition {
        /// The exchange's current state.
        from: ExchangeState,
        /// The requested target state.
        to: ExchangeState,
        /// The exchange type whose transition table rejected the move.
        exchange_type: ExchangeType,
    },

    /// The exchange carries an error marker and must not be mutated.
    #[error("exchange {id} is invalid: {error_code}")]
    InvalidExchange {
        /// The exchange identifier.
        id: ExchangeId,
        /// Stable machine-readable code to surface to the caller.
        error_code: &'static str,
    },

    /// A required creation attribute was missing.
    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),

    /// An offer with this content hash was already delivered on the
    /// exchange.
    #[error("offer content hash already exists on exchange {exchange_id}: {hash}")]
    DuplicateOfferHash {
        /// The exchange identifier.
        exchange_id: ExchangeId,
        /// The duplicate content-hash value.
        hash: String,
    },
}

/// Push-notification delivery failure.
#[derive(Error, Debug)]
#[error("push delivery failed: {0}")]
pub struct PushError(pub String);

/// Delivers async notifications to a holder's registered push delegate.
///
/// Implementations must not block the state transition: the machine
/// awaits `notify` but treats any error as log-only.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    /// Notify the delegate that the exchange changed state.
    async fn notify(&self, delegate: &PushDelegate, exchange: &Exchange) -> Result<(), PushError>;
}

/// A notifier that does nothing. Used when no push transport is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl PushNotifier for NoopNotifier {
    async fn notify(&self, _delegate: &PushDelegate, _exchange: &Exchange) -> Result<(), PushError> {
        Ok(())
    }
}

/// Attributes for creating a new exchange.
#[derive(Debug, Clone, Default)]
pub struct NewExchange {
    /// The exchange type. Required.
    pub exchange_type: Option<ExchangeType>,
    /// The backing request template. Required for `DISCLOSURE`.
    pub disclosure_id: Option<DisclosureId>,
    /// Optional async notification target.
    pub push_delegate: Option<PushDelegate>,
    /// Credential types involved in this exchange.
    pub credential_types: Vec<String>,
    /// Identity-matcher values supplied at creation.
    pub identity_matcher_values: Vec<String>,
    /// Opaque protocol metadata.
    pub protocol_metadata: serde_json::Map<String, Value>,
    /// Initial anti-replay challenge, if already issued.
    pub challenge: Option<String>,
}

/// Extra attributes merged into an exchange alongside a state append.
#[derive(Debug, Clone, Default)]
pub struct ExchangePatch {
    /// Replace the anti-replay challenge.
    pub challenge: Option<String>,
    /// Replace the challenge issuance time.
    pub challenge_issued_at: Option<Timestamp>,
    /// Replace the push delegate.
    pub push_delegate: Option<PushDelegate>,
    /// Merge additional protocol metadata keys.
    pub protocol_metadata: Option<serde_json::Map<String, Value>>,
}

impl ExchangePatch {
    fn apply(self, exchange: &mut Exchange) {
        if let Some(challenge) = self.challenge {
            exchange.challenge = Some(challenge);
        }
        if let Some(issued_at) = self.challenge_issued_at {
            exchange.challenge_issued_at = Some(issued_at);
        }
        if let Some(delegate) = self.push_delegate {
            exchange.push_delegate = Some(delegate);
        }
        if let Some(metadata) = self.protocol_metadata {
            exchange.protocol_metadata.extend(metadata);
        }
    }
}

/// The exchange state machine: all mutations of exchange documents go
/// through here.
#[derive(Clone)]
pub struct ExchangeMachine {
    store: Store<ExchangeId, Exchange>,
    notifier: Arc<dyn PushNotifier>,
}

impl ExchangeMachine {
    /// Create a machine over the given store and notifier.
    pub fn new(store: Store<ExchangeId, Exchange>, notifier: Arc<dyn PushNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Access the backing store.
    pub fn store(&self) -> &Store<ExchangeId, Exchange> {
        &self.store
    }

    /// Create an exchange and append its initial events atomically.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::MissingAttribute`] when `exchange_type`
    /// is absent, or when a `DISCLOSURE` exchange has no `disclosure_id`.
    /// Each initial state must be a valid transition from its predecessor.
    pub fn insert_with_initial_state(
        &self,
        attrs: NewExchange,
        initial_states: &[ExchangeState],
    ) -> Result<Exchange, ExchangeError> {
        let exchange_type = attrs
            .exchange_type
            .ok_or(ExchangeError::MissingAttribute("type"))?;
        if exchange_type == ExchangeType::Disclosure && attrs.disclosure_id.is_none() {
            return Err(ExchangeError::MissingAttribute("disclosureId"));
        }

        let now = Timestamp::now();
        let mut exchange = Exchange {
            id: ExchangeId::new(),
            exchange_type,
            disclosure_id: attrs.disclosure_id,
            events: Vec::new(),
            push_delegate: attrs.push_delegate,
            offer_hashes: Default::default(),
            credential_types: attrs.credential_types,
            identity_matcher_values: attrs.identity_matcher_values,
            protocol_metadata: attrs.protocol_metadata,
            challenge: attrs.challenge,
            challenge_issued_at: None,
            created_at: now,
            updated_at: now,
        };

        for state in initial_states {
            let current = exchange.current_state();
            if !current.can_transition_to(*state, exchange_type) {
                return Err(ExchangeError::InvalidTransition {
                    from: current,
                    to: *state,
                    exchange_type,
                });
            }
            exchange.events.push(StateEvent {
                state: *state,
                timestamp: now,
            });
        }

        self.store.insert(exchange.id, exchange.clone());
        Ok(exchange)
    }

    /// Retrieve an exchange by id.
    pub fn get(&self, id: &ExchangeId) -> Result<Exchange, ExchangeError> {
        self.store.get(id).ok_or(ExchangeError::NotFound(*id))
    }

    /// Append a state event, merging optional extra attributes.
    ///
    /// Transition validation and the append run under one write lock,
    /// against the exchange's *current* last event. Re-adding the terminal
    /// state the exchange is already in is an idempotent no-op: no event
    /// is appended and no notification fires.
    ///
    /// After a successful append the push delegate is notified
    /// best-effort. Delivery failure is logged, never propagated, and
    /// never rolls back the committed event.
    pub async fn add_state(
        &self,
        id: &ExchangeId,
        state: ExchangeState,
        patch: Option<ExchangePatch>,
    ) -> Result<Exchange, ExchangeError> {
        let (exchange, appended) = self
            .store
            .try_update(id, |exchange| {
                let current = exchange.current_state();
                if current == state && current.is_terminal() {
                    return Ok((exchange.clone(), false));
                }
                if !current.can_transition_to(state, exchange.exchange_type) {
                    return Err(ExchangeError::InvalidTransition {
                        from: current,
                        to: state,
                        exchange_type: exchange.exchange_type,
                    });
                }
                let now = Timestamp::now();
                exchange.events.push(StateEvent {
                    state,
                    timestamp: now,
                });
                if let Some(patch) = patch {
                    patch.apply(exchange);
                }
                exchange.updated_at = now;
                Ok((exchange.clone(), true))
            })
            .ok_or(ExchangeError::NotFound(*id))??;

        if appended {
            if let Some(delegate) = &exchange.push_delegate {
                if let Err(err) = self.notifier.notify(delegate, &exchange).await {
                    warn!(exchange_id = %exchange.id, state = %state, error = %err,
                          "push notification failed after state transition");
                }
            }
        }

        Ok(exchange)
    }

    /// Register an offer's content hash on the exchange, atomically
    /// rejecting duplicates.
    ///
    /// The membership check and the insert run under one write lock, so
    /// two concurrent submissions of the same offer content race safely:
    /// exactly one wins.
    pub fn register_offer_hash(
        &self,
        id: &ExchangeId,
        hash: &str,
    ) -> Result<Exchange, ExchangeError> {
        self.store
            .try_update(id, |exchange| {
                if exchange.offer_hashes.contains(hash) {
                    return Err(ExchangeError::DuplicateOfferHash {
                        exchange_id: *id,
                        hash: hash.to_string(),
                    });
                }
                exchange.offer_hashes.insert(hash.to_string());
                exchange.updated_at = Timestamp::now();
                Ok(exchange.clone())
            })
            .ok_or(ExchangeError::NotFound(*id))?
    }

    /// Fail fast if the exchange already carries an error marker.
    ///
    /// Used as a guard before state-mutating operations; the supplied
    /// `error_code` is what the caller wants surfaced on the wire.
    pub fn ensure_exchange_state_valid(
        exchange: &Exchange,
        error_code: &'static str,
    ) -> Result<(), ExchangeError> {
        if exchange.current_state() == ExchangeState::UnexpectedError {
            return Err(ExchangeError::InvalidExchange {
                id: exchange.id,
                error_code,
            });
        }
        Ok(())
    }

    /// Record an unrecoverable failure on the exchange.
    ///
    /// Transitions any non-terminal exchange to `UNEXPECTED_ERROR` and
    /// logs the reason. Already-terminal exchanges are left untouched.
    pub async fn record_unexpected_error(
        &self,
        id: &ExchangeId,
        reason: &str,
    ) -> Result<Exchange, ExchangeError> {
        let exchange = self.get(id)?;
        if exchange.is_terminal() {
            warn!(exchange_id = %id, reason, "unexpected error on already-terminal exchange");
            return Ok(exchange);
        }
        warn!(exchange_id = %id, reason, "recording unexpected error on exchange");
        self.add_state(id, ExchangeState::UnexpectedError, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingNotifier {
        count: AtomicUsize,
    }

    #[async_trait]
    impl PushNotifier for CountingNotifier {
        async fn notify(
            &self,
            _delegate: &PushDelegate,
            _exchange: &Exchange,
        ) -> Result<(), PushError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl PushNotifier for FailingNotifier {
        async fn notify(
            &self,
            _delegate: &PushDelegate,
            _exchange: &Exchange,
        ) -> Result<(), PushError> {
            Err(PushError("connection refused".to_string()))
        }
    }

    fn machine() -> ExchangeMachine {
        ExchangeMachine::new(Store::new(), Arc::new(NoopNotifier))
    }

    fn issuing_attrs() -> NewExchange {
        NewExchange {
            exchange_type: Some(ExchangeType::Issuing),
            ..Default::default()
        }
    }

    #[test]
    fn insert_requires_type() {
        let m = machine();
        let err = m
            .insert_with_initial_state(NewExchange::default(), &[])
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MissingAttribute("type")));
    }

    #[test]
    fn insert_disclosure_requires_disclosure_id() {
        let m = machine();
        let err = m
            .insert_with_initial_state(
                NewExchange {
                    exchange_type: Some(ExchangeType::Disclosure),
                    ..Default::default()
                },
                &[],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::MissingAttribute("disclosureId")
        ));
    }

    #[test]
    fn insert_with_initial_states_appends_in_order() {
        let m = machine();
        let ex = m
            .insert_with_initial_state(
                issuing_attrs(),
                &[ExchangeState::CredentialManifestRequested],
            )
            .unwrap();
        assert_eq!(ex.events.len(), 1);
        assert_eq!(
            ex.current_state(),
            ExchangeState::CredentialManifestRequested
        );
        assert_eq!(m.get(&ex.id).unwrap().events.len(), 1);
    }

    #[test]
    fn insert_rejects_invalid_initial_sequence() {
        let m = machine();
        let err = m
            .insert_with_initial_state(issuing_attrs(), &[ExchangeState::Complete])
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn add_state_appends_valid_transition() {
        let m = machine();
        let ex = m.insert_with_initial_state(issuing_attrs(), &[]).unwrap();
        let updated = m
            .add_state(&ex.id, ExchangeState::CredentialManifestRequested, None)
            .await
            .unwrap();
        assert_eq!(
            updated.current_state(),
            ExchangeState::CredentialManifestRequested
        );
        assert_eq!(updated.events.len(), 1);
    }

    #[tokio::test]
    async fn add_state_rejects_invalid_transition() {
        let m = machine();
        let ex = m.insert_with_initial_state(issuing_attrs(), &[]).unwrap();
        let err = m
            .add_state(&ex.id, ExchangeState::Complete, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidTransition { .. }));
        // Rejected transition leaves the log untouched.
        assert!(m.get(&ex.id).unwrap().events.is_empty());
    }

    #[tokio::test]
    async fn add_state_missing_exchange() {
        let m = machine();
        let err = m
            .add_state(&ExchangeId::new(), ExchangeState::Complete, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_state_merges_patch() {
        let m = machine();
        let ex = m.insert_with_initial_state(issuing_attrs(), &[]).unwrap();
        let issued_at = Timestamp::now();
        let updated = m
            .add_state(
                &ex.id,
                ExchangeState::CredentialManifestRequested,
                Some(ExchangePatch {
                    challenge: Some("c-123".to_string()),
                    challenge_issued_at: Some(issued_at),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        assert_eq!(updated.challenge.as_deref(), Some("c-123"));
        assert_eq!(updated.challenge_issued_at, Some(issued_at));
    }

    async fn drive_to_complete(m: &ExchangeMachine, id: &ExchangeId) {
        m.add_state(id, ExchangeState::CredentialManifestRequested, None)
            .await
            .unwrap();
        m.add_state(id, ExchangeState::OffersReceived, None)
            .await
            .unwrap();
        m.add_state(id, ExchangeState::ClaimingInProgress, None)
            .await
            .unwrap();
        m.add_state(id, ExchangeState::Complete, None).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_complete_is_idempotent_and_notifies_once() {
        let notifier = Arc::new(CountingNotifier {
            count: AtomicUsize::new(0),
        });
        let m = ExchangeMachine::new(Store::new(), notifier.clone());
        let ex = m
            .insert_with_initial_state(
                NewExchange {
                    exchange_type: Some(ExchangeType::Issuing),
                    push_delegate: Some(PushDelegate {
                        push_url: "https://wallet.example/push".to_string(),
                        push_token: "tok".to_string(),
                    }),
                    ..Default::default()
                },
                &[],
            )
            .unwrap();

        drive_to_complete(&m, &ex.id).await;
        let before = notifier.count.load(Ordering::SeqCst);

        // Second COMPLETE: no event appended, no notification fired.
        let again = m
            .add_state(&ex.id, ExchangeState::Complete, None)
            .await
            .unwrap();
        let complete_events = again
            .events
            .iter()
            .filter(|e| e.state == ExchangeState::Complete)
            .count();
        assert_eq!(complete_events, 1);
        assert_eq!(notifier.count.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn transition_out_of_terminal_is_rejected() {
        let m = machine();
        let ex = m.insert_with_initial_state(issuing_attrs(), &[]).unwrap();
        drive_to_complete(&m, &ex.id).await;
        let err = m
            .add_state(&ex.id, ExchangeState::ClaimingInProgress, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn notification_failure_does_not_roll_back() {
        let m = ExchangeMachine::new(Store::new(), Arc::new(FailingNotifier));
        let ex = m
            .insert_with_initial_state(
                NewExchange {
                    exchange_type: Some(ExchangeType::Issuing),
                    push_delegate: Some(PushDelegate {
                        push_url: "https://wallet.example/push".to_string(),
                        push_token: "tok".to_string(),
                    }),
                    ..Default::default()
                },
                &[],
            )
            .unwrap();
        let updated = m
            .add_state(&ex.id, ExchangeState::CredentialManifestRequested, None)
            .await
            .unwrap();
        assert_eq!(
            updated.current_state(),
            ExchangeState::CredentialManifestRequested
        );
    }

    #[test]
    fn register_offer_hash_rejects_duplicates() {
        let m = machine();
        let ex = m.insert_with_initial_state(issuing_attrs(), &[]).unwrap();
        m.register_offer_hash(&ex.id, "abc123").unwrap();
        let err = m.register_offer_hash(&ex.id, "abc123").unwrap_err();
        assert!(matches!(err, ExchangeError::DuplicateOfferHash { .. }));
        m.register_offer_hash(&ex.id, "def456").unwrap();
    }

    #[tokio::test]
    async fn ensure_exchange_state_valid_guards_error_marker() {
        let m = machine();
        let ex = m.insert_with_initial_state(issuing_attrs(), &[]).unwrap();
        assert!(ExchangeMachine::ensure_exchange_state_valid(&ex, "exchange_invalid").is_ok());

        let errored = m.record_unexpected_error(&ex.id, "boom").await.unwrap();
        let err =
            ExchangeMachine::ensure_exchange_state_valid(&errored, "exchange_invalid").unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidExchange {
                error_code: "exchange_invalid",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn record_unexpected_error_leaves_terminal_untouched() {
        let m = machine();
        let ex = m.insert_with_initial_state(issuing_attrs(), &[]).unwrap();
        drive_to_complete(&m, &ex.id).await;
        let after = m.record_unexpected_error(&ex.id, "late failure").await.unwrap();
        assert_eq!(after.current_state(), ExchangeState::Complete);
    }

    #[tokio::test]
    async fn resumed_exchange_validates_from_current_state() {
        let m = machine();
        let ex = m
            .insert_with_initial_state(
                issuing_attrs(),
                &[ExchangeState::CredentialManifestRequested],
            )
            .unwrap();
        // Resume by id: a NEW-only transition must be rejected now.
        let err = m
            .add_state(&ex.id, ExchangeState::CredentialManifestRequested, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidTransition { .. }));
        // The legal next step from the current event succeeds.
        m.add_state(&ex.id, ExchangeState::OffersReceived, None)
            .await
            .unwrap();
    }
}
