//! # Proof-of-Possession Resolver
//!
//! Verifies a holder-supplied proof token and derives the credential
//! subject identity from it. The checks run as a strict ladder; the
//! first failing rung produces a single typed error carrying a stable
//! `errorCode`, so clients branch on semantics rather than on transport
//! status. No partial or ambiguous state is ever exposed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use credo_core::{Did, Timestamp};

use crate::resolve::DidResolver;
use crate::token::{self, PublicJwk};

/// A holder-supplied possession proof. Transient: verified, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    /// Proof mechanism; only `"jwt"` is supported.
    pub proof_type: String,
    /// The signed proof token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
}

/// Verification parameters from the exchange and service config.
#[derive(Debug, Clone)]
pub struct ProofParams {
    /// The service's own host URL; the token's `aud` must be prefixed
    /// by it.
    pub host_url: String,
    /// The exchange's stored anti-replay challenge.
    pub challenge: Option<String>,
    /// When the challenge was issued.
    pub challenge_issued_at: Option<Timestamp>,
    /// Challenge lifetime in seconds.
    pub ttl_secs: i64,
}

/// The subject identity bound by a verified proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectBinding {
    /// Subject identifier (a DID).
    pub id: String,
    /// The holder's key, when it arrived embedded in the proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<PublicJwk>,
}

/// Proof verification failures, one per ladder rung.
#[derive(Error, Debug)]
pub enum ProofError {
    /// No proof was supplied.
    #[error("proof is missing or invalid")]
    MissingProof,

    /// The proof mechanism is not `"jwt"`.
    #[error("unsupported proof type: {0}")]
    InvalidProofType(String),

    /// The proof carries no token.
    #[error("proof jwt is required")]
    MissingJwt,

    /// The token header carries neither `jwk` nor `kid`.
    #[error("proof header must carry one of jwk or kid")]
    OneOfJwkKidRequired,

    /// The `kid` reference could not be resolved to key material.
    #[error("proof kid could not be resolved: {0}")]
    InvalidKid(String),

    /// The token is structurally broken or its signature does not
    /// verify.
    #[error("proof jwt failed verification")]
    BadJwt,

    /// The token audience is not this service.
    #[error("proof audience does not match this service")]
    BadAudience,

    /// The token nonce does not match the exchange challenge.
    #[error("proof challenge does not match")]
    ChallengeMismatch,

    /// The exchange challenge expired before the proof arrived.
    #[error("proof challenge expired")]
    ChallengeExpired,
}

impl ProofError {
    /// The stable machine-readable code for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingProof => "invalid_or_missing_proof",
            Self::InvalidProofType(_) => "proof_type_invalid",
            Self::MissingJwt => "proof_jwt_is_required",
            Self::OneOfJwkKidRequired => "proof_one_of_jwk_kid_required",
            Self::InvalidKid(_) => "proof_invalid_kid",
            Self::BadJwt => "proof_bad_jwt",
            Self::BadAudience => "proof_bad_aud",
            Self::ChallengeMismatch => "proof_challenge_mismatch",
            Self::ChallengeExpired => "proof_challenge_expired",
        }
    }
}

/// Verify a possession proof and derive the subject identity.
///
/// Key selection: a `kid` header is stripped of any `#fragment`,
/// resolved as a DID document, and the document's first verification
/// method supplies the key; the document id becomes the subject id. An
/// embedded `jwk` (with no `kid`) is used directly, and the subject id
/// is derived from the key's RFC 7638 thumbprint with no external
/// resolution. When both are present the `kid` reference wins.
///
/// The challenge TTL is a wall-clock comparison at verification time.
pub async fn resolve_subject(
    proof: Option<&Proof>,
    params: &ProofParams,
    resolver: &dyn DidResolver,
) -> Result<SubjectBinding, ProofError> {
    let proof = proof.ok_or(ProofError::MissingProof)?;
    if proof.proof_type != "jwt" {
        return Err(ProofError::InvalidProofType(proof.proof_type.clone()));
    }
    let jwt = match proof.jwt.as_deref() {
        Some(jwt) if !jwt.is_empty() => jwt,
        _ => return Err(ProofError::MissingJwt),
    };

    let decoded = token::decode(jwt).map_err(|_| ProofError::BadJwt)?;

    let (subject_id, jwk) = match (&decoded.header.kid, &decoded.header.jwk) {
        (Some(kid), _) => {
            let did = Did::new(kid.as_str())
                .map_err(|e| ProofError::InvalidKid(e.to_string()))?
                .strip_fragment();
            let document = resolver
                .resolve(&did)
                .await
                .map_err(|e| ProofError::InvalidKid(e.to_string()))?;
            let key = document
                .first_public_key()
                .ok_or_else(|| {
                    ProofError::InvalidKid(format!("no key material in document for {did}"))
                })?
                .clone();
            (document.id, key)
        }
        (None, Some(jwk)) => {
            let thumbprint = jwk.thumbprint().map_err(|_| ProofError::BadJwt)?;
            (format!("did:jwk:{thumbprint}"), jwk.clone())
        }
        (None, None) => return Err(ProofError::OneOfJwkKidRequired),
    };

    let verifying_key = jwk.verifying_key().map_err(|_| ProofError::BadJwt)?;
    decoded
        .verify_signature(&verifying_key)
        .map_err(|_| ProofError::BadJwt)?;

    match decoded.claim_str("aud") {
        Some(aud) if aud.starts_with(&params.host_url) => {}
        _ => return Err(ProofError::BadAudience),
    }

    match (decoded.claim_str("nonce"), params.challenge.as_deref()) {
        (Some(nonce), Some(challenge)) if nonce == challenge => {}
        _ => return Err(ProofError::ChallengeMismatch),
    }

    let issued_at = params
        .challenge_issued_at
        .ok_or(ProofError::ChallengeExpired)?;
    let deadline = issued_at.plus_seconds(params.ttl_secs);
    if Timestamp::now() > deadline {
        return Err(ProofError::ChallengeExpired);
    }

    let embedded = decoded.header.jwk.clone();
    Ok(SubjectBinding {
        id: subject_id,
        jwk: embedded,
    })
}
