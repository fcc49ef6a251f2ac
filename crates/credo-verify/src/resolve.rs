//! # Collaborator Seams
//!
//! The verification pipeline and the proof resolver never talk to the
//! network directly. They depend on two async traits: [`DidResolver`]
//! for DID documents and [`IssuerRegistry`] for issuer profiles and
//! credential-type metadata. The HTTP implementation of both lives in
//! [`registrar`][crate::registrar]; tests supply in-memory stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use credo_core::Did;

use crate::token::PublicJwk;

/// Failure modes of collaborator resolution.
///
/// `NotFound` means the subject is unknown to the collaborator (a
/// 404-class condition); `Unavailable` means the collaborator itself
/// could not be reached (502-class, a candidate for caller-side retry
/// with backoff).
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The collaborator does not know the subject.
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator could not be reached.
    #[error("resolver unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered with an unparseable document.
    #[error("malformed resolution response: {0}")]
    Malformed(String),
}

/// A verification method inside a DID document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// Method identifier (DID URL).
    pub id: String,
    /// Method type (e.g. `"JsonWebKey2020"`).
    #[serde(rename = "type")]
    pub method_type: String,
    /// The DID controlling this key.
    pub controller: String,
    /// The public key in JWK form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<PublicJwk>,
}

/// A resolved DID document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// The document's DID.
    pub id: String,
    /// Verification methods; the first one is used for signature checks.
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
}

impl DidDocument {
    /// The public key of the document's first verification method.
    pub fn first_public_key(&self) -> Option<&PublicJwk> {
        self.verification_method
            .iter()
            .find_map(|vm| vm.public_key_jwk.as_ref())
    }
}

/// Resolves DIDs to DID documents.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolve a DID to its document.
    async fn resolve(&self, did: &Did) -> Result<DidDocument, ResolutionError>;
}

/// An issuer's verified organizational profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedProfile {
    /// The issuer's DID.
    pub did: String,
    /// Whether the organization passed registry verification.
    pub verified: bool,
    /// Display name of the organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Schema and status metadata for a credential type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialTypeMetadata {
    /// The credential type name.
    pub credential_type: String,
    /// Schema document URL, when the type has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
    /// Whether credentials of this type can be revoked.
    #[serde(default)]
    pub revocable: bool,
    /// Whether checking this type consumes a voucher.
    #[serde(default)]
    pub requires_voucher: bool,
}

/// Issuer-registry collaborator: organizational profiles and
/// credential-type metadata.
#[async_trait]
pub trait IssuerRegistry: Send + Sync {
    /// Fetch an issuer's verified organizational profile.
    async fn organization_verified_profile(
        &self,
        did: &Did,
    ) -> Result<VerifiedProfile, ResolutionError>;

    /// Fetch schema/status metadata for a credential type.
    async fn credential_type_metadata(
        &self,
        credential_type: &str,
    ) -> Result<CredentialTypeMetadata, ResolutionError>;
}
