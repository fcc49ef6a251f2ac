//! # Offer Builder
//!
//! Turns a vendor-supplied offer payload into a stored [`Offer`]:
//! reference enrichment, degraded-link handling, issuer defaulting, and
//! the deterministic content hash.
//!
//! ## Content-Hash Scope
//!
//! The hash covers the offer's substantive fields only: `type`, `issuer`
//! (after defaulting), `credentialSubject`, and the identifier/link-type
//! projection of `linkedCredentials`, `relatedResource` and `replaces`.
//! It excludes `linkCode`, `linkCodeCommitment`, `contentHash` itself,
//! `exchangeId`, the offer id, status, timestamps, and the metadata
//! attached during reference resolution (`digestSRI`, `hint`,
//! `invalidAt`, `invalidReason`). Two structurally identical offers
//! submitted on different exchanges, or built against different ref maps,
//! therefore hash identically.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use credo_core::{content_hash, CanonicalBytes, CanonicalizationError, Did, OfferId, Timestamp};

use crate::exchange::Exchange;
use crate::offer::{
    Issuer, IssuerRecord, LinkCode, LinkedCredentialRef, Offer, OfferStatus, RelatedResource,
};

/// Reason string attached to a linked-credential entry whose target
/// could not be resolved.
pub const LINKED_CREDENTIAL_NOT_FOUND: &str = "linked_credential_not_found";

/// Errors from offer construction.
#[derive(Error, Debug)]
pub enum OfferBuildError {
    /// The offer declared no credential type.
    #[error("offer must declare at least one credential type")]
    EmptyCredentialType,

    /// Canonicalization of the hashable projection failed.
    #[error("content hash computation failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// The operator identity offers are issued under.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// The operator's DID, injected as the default issuer id.
    pub did: Did,
}

/// A previously issued credential known to the caller, keyed by id in
/// the refs map handed to [`build_offer`].
#[derive(Debug, Clone, Default)]
pub struct CredentialRef {
    /// Subresource-integrity digest of the credential.
    pub digest_sri: Option<String>,
    /// Display hint for wallets.
    pub hint: Option<String>,
    /// Media type of the credential document.
    pub media_type: Option<String>,
}

/// A linked-credential entry as supplied by the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedCredentialInput {
    /// Identifier of the credential to link.
    pub linked_credential_id: String,
    /// The relationship kind.
    pub link_type: String,
}

/// Vendor-supplied offer payload, before enrichment and hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferInput {
    /// Credential type array.
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    /// Claims about the subject.
    pub credential_subject: Value,
    /// Issuer as supplied; absent means "default to the operator".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Issuer>,
    /// Links to previously issued credentials.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_credentials: Vec<LinkedCredentialInput>,
    /// Related external resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_resource: Vec<RelatedResource>,
    /// Credentials this offer replaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaces: Vec<RelatedResource>,
}

/// Projection of an offer's substantive fields, used only for hashing.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashableOffer<'a> {
    #[serde(rename = "type")]
    credential_type: &'a [String],
    credential_subject: &'a Value,
    issuer: &'a Issuer,
    linked_credentials: &'a [LinkedCredentialInput],
    related_resource: Vec<&'a str>,
    replaces: Vec<&'a str>,
}

/// Build a content-addressed offer from a vendor payload.
///
/// - `relatedResource`/`replaces` entries are enriched with `digestSRI`,
///   `hint` and `mediaType` from `credential_refs`; unresolved entries
///   pass through unchanged.
/// - `linkedCredentials` entries whose id is absent from the refs map are
///   kept in degraded form (`invalidAt` + `invalidReason`) rather than
///   failing the build. Offers are never dropped over one bad link.
/// - The issuer defaults to the tenant: absent becomes
///   `{id: tenant.did}`; an issuer object gets the tenant DID as its
///   `id` while its other fields pass through. A bare-string issuer is
///   preserved verbatim and bypasses the default entirely; existing
///   vendor payloads depend on the string form passing through, so the
///   asymmetry is kept.
pub fn build_offer(
    input: OfferInput,
    credential_refs: &HashMap<String, CredentialRef>,
    tenant: &TenantContext,
    exchange: &Exchange,
) -> Result<Offer, OfferBuildError> {
    if input.credential_type.is_empty() {
        return Err(OfferBuildError::EmptyCredentialType);
    }

    let issuer = default_issuer(input.issuer.clone(), tenant);

    let hashable = HashableOffer {
        credential_type: &input.credential_type,
        credential_subject: &input.credential_subject,
        issuer: &issuer,
        linked_credentials: &input.linked_credentials,
        related_resource: input.related_resource.iter().map(|r| r.id.as_str()).collect(),
        replaces: input.replaces.iter().map(|r| r.id.as_str()).collect(),
    };
    let content_hash = content_hash(&CanonicalBytes::new(&hashable)?);

    let now = Timestamp::now();
    let linked_credentials = input
        .linked_credentials
        .into_iter()
        .map(|link| resolve_link(link, credential_refs, now))
        .collect();
    let related_resource = input
        .related_resource
        .into_iter()
        .map(|r| enrich_resource(r, credential_refs))
        .collect();
    let replaces = input
        .replaces
        .into_iter()
        .map(|r| enrich_resource(r, credential_refs))
        .collect();

    let link_code = LinkCode::generate();
    let link_code_commitment = link_code.commitment();

    Ok(Offer {
        id: OfferId::new(),
        exchange_id: exchange.id,
        credential_type: input.credential_type,
        credential_subject: input.credential_subject,
        issuer,
        content_hash,
        link_code,
        link_code_commitment,
        linked_credentials,
        related_resource,
        replaces,
        status: OfferStatus::Pending,
        created_at: now,
    })
}

fn default_issuer(issuer: Option<Issuer>, tenant: &TenantContext) -> Issuer {
    match issuer {
        None => Issuer::Record(IssuerRecord {
            id: tenant.did.to_string(),
            name: None,
            image: None,
        }),
        Some(Issuer::Record(record)) => Issuer::Record(IssuerRecord {
            id: tenant.did.to_string(),
            ..record
        }),
        // String-form issuers pass through verbatim, skipping the tenant
        // default.
        Some(reference @ Issuer::Reference(_)) => reference,
    }
}

fn resolve_link(
    link: LinkedCredentialInput,
    refs: &HashMap<String, CredentialRef>,
    now: Timestamp,
) -> LinkedCredentialRef {
    match refs.get(&link.linked_credential_id) {
        Some(resolved) => LinkedCredentialRef {
            linked_credential_id: link.linked_credential_id,
            link_type: link.link_type,
            digest_sri: resolved.digest_sri.clone(),
            invalid_at: None,
            invalid_reason: None,
        },
        None => LinkedCredentialRef {
            linked_credential_id: link.linked_credential_id,
            link_type: link.link_type,
            digest_sri: None,
            invalid_at: Some(now),
            invalid_reason: Some(LINKED_CREDENTIAL_NOT_FOUND.to_string()),
        },
    }
}

fn enrich_resource(
    mut resource: RelatedResource,
    refs: &HashMap<String, CredentialRef>,
) -> RelatedResource {
    if let Some(resolved) = refs.get(&resource.id) {
        if resource.digest_sri.is_none() {
            resource.digest_sri = resolved.digest_sri.clone();
        }
        if resource.hint.is_none() {
            resource.hint = resolved.hint.clone();
        }
        if resource.media_type.is_none() {
            resource.media_type = resolved.media_type.clone();
        }
    }
    resource
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeType;
    use credo_core::ExchangeId;

    fn tenant() -> TenantContext {
        TenantContext {
            did: Did::new("did:web:operator.example").unwrap(),
        }
    }

    fn exchange() -> Exchange {
        Exchange {
            id: ExchangeId::new(),
            exchange_type: ExchangeType::Issuing,
            disclosure_id: None,
            events: Vec::new(),
            push_delegate: None,
            offer_hashes: Default::default(),
            credential_types: Vec::new(),
            identity_matcher_values: Vec::new(),
            protocol_metadata: serde_json::Map::new(),
            challenge: None,
            challenge_issued_at: None,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        }
    }

    fn input() -> OfferInput {
        OfferInput {
            credential_type: vec!["VerifiedEmployee".to_string()],
            credential_subject: serde_json::json!({"vendorUserId": "u1"}),
            issuer: None,
            linked_credentials: Vec::new(),
            related_resource: Vec::new(),
            replaces: Vec::new(),
        }
    }

    #[test]
    fn rejects_empty_credential_type() {
        let mut bad = input();
        bad.credential_type.clear();
        let err = build_offer(bad, &HashMap::new(), &tenant(), &exchange()).unwrap_err();
        assert!(matches!(err, OfferBuildError::EmptyCredentialType));
    }

    #[test]
    fn content_hash_ignores_exchange_id() {
        let a = build_offer(input(), &HashMap::new(), &tenant(), &exchange()).unwrap();
        let b = build_offer(input(), &HashMap::new(), &tenant(), &exchange()).unwrap();
        assert_ne!(a.exchange_id, b.exchange_id);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn content_hash_ignores_link_material() {
        let a = build_offer(input(), &HashMap::new(), &tenant(), &exchange()).unwrap();
        let b = build_offer(input(), &HashMap::new(), &tenant(), &exchange()).unwrap();
        assert_ne!(a.link_code, b.link_code);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn content_hash_changes_with_subject() {
        let a = build_offer(input(), &HashMap::new(), &tenant(), &exchange()).unwrap();
        let mut other = input();
        other.credential_subject = serde_json::json!({"vendorUserId": "u2"});
        let b = build_offer(other, &HashMap::new(), &tenant(), &exchange()).unwrap();
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn content_hash_ignores_ref_map_enrichment() {
        let mut with_link = input();
        with_link.linked_credentials.push(LinkedCredentialInput {
            linked_credential_id: "cred-1".to_string(),
            link_type: "REVOKES".to_string(),
        });

        let empty_refs = HashMap::new();
        let mut full_refs = HashMap::new();
        full_refs.insert(
            "cred-1".to_string(),
            CredentialRef {
                digest_sri: Some("sha256-abc".to_string()),
                ..Default::default()
            },
        );

        let degraded =
            build_offer(with_link.clone(), &empty_refs, &tenant(), &exchange()).unwrap();
        let resolved = build_offer(with_link, &full_refs, &tenant(), &exchange()).unwrap();
        assert_eq!(degraded.content_hash, resolved.content_hash);
    }

    #[test]
    fn issuer_defaults_to_tenant_when_absent() {
        let offer = build_offer(input(), &HashMap::new(), &tenant(), &exchange()).unwrap();
        assert_eq!(
            offer.issuer,
            Issuer::Record(IssuerRecord {
                id: "did:web:operator.example".to_string(),
                name: None,
                image: None,
            })
        );
    }

    #[test]
    fn issuer_object_id_is_overridden_fields_kept() {
        let mut with_issuer = input();
        with_issuer.issuer = Some(Issuer::Record(IssuerRecord {
            id: "did:web:vendor.example".to_string(),
            name: Some("Vendor Co".to_string()),
            image: Some("https://vendor.example/logo.png".to_string()),
        }));
        let offer = build_offer(with_issuer, &HashMap::new(), &tenant(), &exchange()).unwrap();
        let Issuer::Record(record) = offer.issuer else {
            panic!("expected issuer record");
        };
        assert_eq!(record.id, "did:web:operator.example");
        assert_eq!(record.name.as_deref(), Some("Vendor Co"));
        assert_eq!(
            record.image.as_deref(),
            Some("https://vendor.example/logo.png")
        );
    }

    #[test]
    fn bare_string_issuer_passes_through_verbatim() {
        let mut with_issuer = input();
        with_issuer.issuer = Some(Issuer::Reference("did:web:vendor.example".to_string()));
        let offer = build_offer(with_issuer, &HashMap::new(), &tenant(), &exchange()).unwrap();
        assert_eq!(
            offer.issuer,
            Issuer::Reference("did:web:vendor.example".to_string())
        );
    }

    #[test]
    fn unresolved_link_is_degraded_not_fatal() {
        let mut with_link = input();
        with_link.linked_credentials.push(LinkedCredentialInput {
            linked_credential_id: "missing".to_string(),
            link_type: "REVOKES".to_string(),
        });
        let offer = build_offer(with_link, &HashMap::new(), &tenant(), &exchange()).unwrap();
        let link = &offer.linked_credentials[0];
        assert_eq!(
            link.invalid_reason.as_deref(),
            Some(LINKED_CREDENTIAL_NOT_FOUND)
        );
        assert!(link.invalid_at.is_some());
        assert!(link.digest_sri.is_none());
    }

    #[test]
    fn resolved_link_carries_digest() {
        let mut with_link = input();
        with_link.linked_credentials.push(LinkedCredentialInput {
            linked_credential_id: "cred-1".to_string(),
            link_type: "SUPERSEDES".to_string(),
        });
        let mut refs = HashMap::new();
        refs.insert(
            "cred-1".to_string(),
            CredentialRef {
                digest_sri: Some("sha256-abc".to_string()),
                ..Default::default()
            },
        );
        let offer = build_offer(with_link, &refs, &tenant(), &exchange()).unwrap();
        let link = &offer.linked_credentials[0];
        assert_eq!(link.digest_sri.as_deref(), Some("sha256-abc"));
        assert!(link.invalid_reason.is_none());
    }

    #[test]
    fn related_resource_enriched_when_resolvable() {
        let mut with_related = input();
        with_related.related_resource.push(RelatedResource {
            id: "res-1".to_string(),
            hint: None,
            digest_sri: None,
            media_type: None,
        });
        with_related.replaces.push(RelatedResource {
            id: "unknown".to_string(),
            hint: None,
            digest_sri: None,
            media_type: None,
        });
        let mut refs = HashMap::new();
        refs.insert(
            "res-1".to_string(),
            CredentialRef {
                digest_sri: Some("sha256-def".to_string()),
                hint: Some("Employment record".to_string()),
                media_type: Some("application/json".to_string()),
            },
        );
        let offer = build_offer(with_related, &refs, &tenant(), &exchange()).unwrap();
        let related = &offer.related_resource[0];
        assert_eq!(related.digest_sri.as_deref(), Some("sha256-def"));
        assert_eq!(related.hint.as_deref(), Some("Employment record"));
        // Unresolved entry passes through unchanged.
        let replaced = &offer.replaces[0];
        assert_eq!(replaced.id, "unknown");
        assert!(replaced.digest_sri.is_none());
    }

    #[test]
    fn new_offer_is_pending_with_commitment() {
        let offer = build_offer(input(), &HashMap::new(), &tenant(), &exchange()).unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);
        assert_eq!(offer.link_code_commitment, offer.link_code.commitment());
    }
}
