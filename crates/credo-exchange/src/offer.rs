//! # Offer Records
//!
//! A prepared, not-yet-signed credential. Offers are content-addressed:
//! the `contentHash` is a pure function of the offer's substantive fields
//! (see [`builder`][crate::builder]), so structurally identical offers
//! from different exchanges hash identically and duplicates are rejected
//! at submission.
//!
//! ## Link Codes
//!
//! Each offer carries a random 160-bit `linkCode` secret and its one-way
//! `linkCodeCommitment`. A future revocation or replacement event can
//! prove linkage to this credential by revealing the code, without third
//! parties learning the secret beforehand. The pair is generated once per
//! offer and never regenerated.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use credo_core::{ContentHash, ExchangeId, OfferId, Timestamp};

/// The issuer of an offer: either a bare identifier or a structured
/// record.
///
/// Vendors send both shapes on the wire, so the variant is resolved at
/// the boundary by serde rather than by shape-sniffing downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Issuer {
    /// A bare identifier string.
    Reference(String),
    /// A structured issuer record.
    Record(IssuerRecord),
}

/// Structured issuer identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerRecord {
    /// Issuer identifier (a DID for operator-issued credentials).
    pub id: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Logo or avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A 160-bit random linkage secret, base64url-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkCode(String);

impl LinkCode {
    /// Generate a fresh link code from the OS entropy source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 20];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Compute the one-way commitment to this link code.
    ///
    /// SHA-256 over the encoded code: deterministic, collision-resistant,
    /// not reversible. Recomputing on the same code always yields the
    /// same commitment.
    pub fn commitment(&self) -> LinkCodeCommitment {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        LinkCodeCommitment {
            commitment_type: "sha-256".to_string(),
            value: URL_SAFE_NO_PAD.encode(hasher.finalize()),
        }
    }

    /// Access the encoded link code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One-way commitment to a [`LinkCode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCodeCommitment {
    /// The hash algorithm, `"sha-256"`.
    #[serde(rename = "type")]
    pub commitment_type: String,
    /// Base64url-encoded digest of the link code.
    pub value: String,
}

/// A reference from this offer to a previously issued credential.
///
/// When the referenced credential cannot be resolved at build time the
/// entry is kept in degraded form, carrying `invalidAt`/`invalidReason`
/// instead of failing the whole offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedCredentialRef {
    /// Identifier of the linked credential.
    pub linked_credential_id: String,
    /// The relationship kind (e.g. `"REVOKES"`, `"SUPERSEDES"`).
    pub link_type: String,
    /// Subresource-integrity digest of the linked credential.
    #[serde(rename = "digestSRI", skip_serializing_if = "Option::is_none")]
    pub digest_sri: Option<String>,
    /// When the link was found unresolvable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_at: Option<Timestamp>,
    /// Why the link is degraded (e.g. `"linked_credential_not_found"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

/// An external resource related to (or replaced by) this offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedResource {
    /// Resource identifier.
    pub id: String,
    /// Display hint attached during resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Subresource-integrity digest attached during resolution.
    #[serde(rename = "digestSRI", skip_serializing_if = "Option::is_none")]
    pub digest_sri: Option<String>,
    /// Media type of the resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Offer lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    /// Awaiting a holder decision.
    #[serde(rename = "PENDING")]
    Pending,
    /// Converted into a signed credential. Immutable from here.
    #[serde(rename = "CLAIMED")]
    Claimed,
    /// Declined by the holder.
    #[serde(rename = "REJECTED")]
    Rejected,
}

/// A prepared, content-addressed, not-yet-signed credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    /// Unique offer identifier.
    pub id: OfferId,
    /// The exchange this offer was delivered on.
    pub exchange_id: ExchangeId,
    /// Credential type array (e.g. `["VerifiedEmployee"]`).
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    /// Claims about the subject.
    pub credential_subject: Value,
    /// Issuer identity after defaulting.
    pub issuer: Issuer,
    /// Deterministic hash of the offer's substantive fields.
    pub content_hash: ContentHash,
    /// Linkage secret, generated once.
    pub link_code: LinkCode,
    /// One-way commitment to the link code.
    pub link_code_commitment: LinkCodeCommitment,
    /// References to previously issued credentials.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_credentials: Vec<LinkedCredentialRef>,
    /// Related external resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_resource: Vec<RelatedResource>,
    /// Credentials this offer replaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaces: Vec<RelatedResource>,
    /// Offer lifecycle status.
    pub status: OfferStatus,
    /// When the offer was built.
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_codes_are_unique() {
        assert_ne!(LinkCode::generate(), LinkCode::generate());
    }

    #[test]
    fn link_code_is_urlsafe_base64_of_20_bytes() {
        let code = LinkCode::generate();
        let decoded = URL_SAFE_NO_PAD.decode(code.as_str()).unwrap();
        assert_eq!(decoded.len(), 20);
    }

    #[test]
    fn commitment_is_deterministic() {
        let code = LinkCode::generate();
        assert_eq!(code.commitment(), code.commitment());
    }

    #[test]
    fn different_codes_different_commitments() {
        let a = LinkCode::generate();
        let b = LinkCode::generate();
        assert_ne!(a.commitment(), b.commitment());
    }

    #[test]
    fn commitment_shape() {
        let c = LinkCode::generate().commitment();
        assert_eq!(c.commitment_type, "sha-256");
        // 32 bytes base64url without padding.
        assert_eq!(c.value.len(), 43);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "sha-256");
    }

    #[test]
    fn issuer_deserializes_both_shapes() {
        let reference: Issuer = serde_json::from_str("\"did:web:vendor.example\"").unwrap();
        assert_eq!(
            reference,
            Issuer::Reference("did:web:vendor.example".to_string())
        );

        let record: Issuer =
            serde_json::from_str(r#"{"id": "did:web:op.example", "name": "Operator"}"#).unwrap();
        assert_eq!(
            record,
            Issuer::Record(IssuerRecord {
                id: "did:web:op.example".to_string(),
                name: Some("Operator".to_string()),
                image: None,
            })
        );
    }

    #[test]
    fn issuer_serializes_reference_as_bare_string() {
        let issuer = Issuer::Reference("did:web:vendor.example".to_string());
        let json = serde_json::to_string(&issuer).unwrap();
        assert_eq!(json, "\"did:web:vendor.example\"");
    }

    #[test]
    fn linked_credential_ref_camel_case_wire_shape() {
        let link = LinkedCredentialRef {
            linked_credential_id: "cred-1".to_string(),
            link_type: "REVOKES".to_string(),
            digest_sri: None,
            invalid_at: None,
            invalid_reason: Some("linked_credential_not_found".to_string()),
        };
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["linkedCredentialId"], "cred-1");
        assert_eq!(json["invalidReason"], "linked_credential_not_found");
        assert!(json.get("digestSRI").is_none() && json.get("digestSri").is_none());
    }
}
