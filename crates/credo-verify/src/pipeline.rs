//! # Credential Verification Pipeline
//!
//! Given raw signed credential tokens, resolves their issuers, checks
//! signature, issuer trust, expiry and revocation, and reports one
//! result per input.
//!
//! ## Contract: never lose a credential
//!
//! Each credential is verified independently. A failure — malformed
//! token, unresolvable issuer, bad signature — marks the corresponding
//! checks and moves on; nothing throws past an individual credential,
//! and the output always has exactly one entry per input, in input
//! order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use credo_core::{Did, Timestamp};

use crate::resolve::{CredentialTypeMetadata, DidResolver, IssuerRegistry, ResolutionError};
use crate::token;

/// One raw credential submitted for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCredential {
    /// Caller-assigned identifier, echoed in the result.
    pub id: String,
    /// The compact signed credential token.
    pub raw_credential: String,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckResult {
    /// The check ran and passed.
    #[serde(rename = "PASS")]
    Pass,
    /// The check ran and failed.
    #[serde(rename = "FAIL")]
    Fail,
    /// The check does not apply to this credential.
    #[serde(rename = "NOT_CHECKED")]
    NotChecked,
    /// A collaborator needed by the check could not be reached.
    #[serde(rename = "DEPENDENCY_RESOLUTION_ERROR")]
    DependencyResolutionError,
}

/// The per-credential check report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialChecks {
    /// Token decodes and its signature verifies against the issuer key.
    #[serde(rename = "UNTAMPERED")]
    pub untampered: CheckResult,
    /// Issuer resolves, its profile is verified, and the credential type
    /// is known to the registry.
    #[serde(rename = "TRUSTED_ISSUER")]
    pub trusted_issuer: CheckResult,
    /// The credential has not expired.
    #[serde(rename = "UNEXPIRED")]
    pub unexpired: CheckResult,
    /// The credential has not been revoked. `NOT_CHECKED` for
    /// non-revocable types.
    #[serde(rename = "UNREVOKED")]
    pub unrevoked: CheckResult,
}

impl CredentialChecks {
    fn all(result: CheckResult) -> Self {
        Self {
            untampered: result,
            trusted_issuer: result,
            unexpired: result,
            unrevoked: result,
        }
    }

    /// Whether every applicable check passed.
    pub fn all_passed(&self) -> bool {
        [
            self.untampered,
            self.trusted_issuer,
            self.unexpired,
            self.unrevoked,
        ]
        .iter()
        .all(|c| matches!(c, CheckResult::Pass | CheckResult::NotChecked))
    }
}

/// The verification result for one submitted credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCheckResult {
    /// The caller-assigned identifier.
    pub id: String,
    /// The decoded credential claims, when the token decoded at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<Value>,
    /// Per-check outcomes.
    pub credential_checks: CredentialChecks,
}

/// A voucher-gated credential type was checked without a voucher.
#[derive(Error, Debug)]
#[error("credential type {credential_type} requires a voucher and none was supplied")]
pub struct PaymentRequiredError {
    /// The gated credential type.
    pub credential_type: String,
}

/// Verify a batch of raw credentials.
///
/// Returns one [`CredentialCheckResult`] per input, in input order,
/// alongside the credential-type metadata gathered along the way (used
/// by [`check_payment_requirement`]).
pub async fn verify_credentials(
    raw_credentials: &[RawCredential],
    resolver: &dyn DidResolver,
    registry: &dyn IssuerRegistry,
) -> (
    Vec<CredentialCheckResult>,
    HashMap<String, CredentialTypeMetadata>,
) {
    let mut results = Vec::with_capacity(raw_credentials.len());
    let mut metadata_by_type = HashMap::new();

    for raw in raw_credentials {
        let result = verify_one(raw, resolver, registry, &mut metadata_by_type).await;
        results.push(result);
    }

    (results, metadata_by_type)
}

async fn verify_one(
    raw: &RawCredential,
    resolver: &dyn DidResolver,
    registry: &dyn IssuerRegistry,
    metadata_by_type: &mut HashMap<String, CredentialTypeMetadata>,
) -> CredentialCheckResult {
    let decoded = match token::decode(&raw.raw_credential) {
        Ok(decoded) => decoded,
        Err(err) => {
            debug!(credential_id = %raw.id, error = %err, "credential token failed to decode");
            return CredentialCheckResult {
                id: raw.id.clone(),
                credential: None,
                credential_checks: CredentialChecks {
                    untampered: CheckResult::Fail,
                    ..CredentialChecks::all(CheckResult::NotChecked)
                },
            };
        }
    };

    let mut checks = CredentialChecks::all(CheckResult::NotChecked);

    // Issuer identity: the `iss` claim, falling back to `vc.issuer.id`.
    let issuer_id = decoded
        .claim_str("iss")
        .map(str::to_string)
        .or_else(|| {
            decoded
                .claims
                .pointer("/vc/issuer/id")
                .or_else(|| decoded.claims.pointer("/vc/issuer"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

    match issuer_id.as_deref().map(Did::new) {
        Some(Ok(issuer_did)) => {
            match resolver.resolve(&issuer_did).await {
                Ok(document) => {
                    checks.untampered = match document
                        .first_public_key()
                        .ok_or(())
                        .and_then(|jwk| jwk.verifying_key().map_err(|_| ()))
                        .and_then(|key| decoded.verify_signature(&key).map_err(|_| ()))
                    {
                        Ok(()) => CheckResult::Pass,
                        Err(()) => CheckResult::Fail,
                    };
                }
                Err(ResolutionError::Unavailable(reason)) => {
                    debug!(credential_id = %raw.id, %reason, "issuer resolution unavailable");
                    checks.untampered = CheckResult::DependencyResolutionError;
                }
                Err(_) => {
                    checks.untampered = CheckResult::Fail;
                }
            }

            checks.trusted_issuer = match registry.organization_verified_profile(&issuer_did).await
            {
                Ok(profile) if profile.verified => CheckResult::Pass,
                Ok(_) => CheckResult::Fail,
                Err(ResolutionError::Unavailable(_)) => CheckResult::DependencyResolutionError,
                Err(_) => CheckResult::Fail,
            };
        }
        _ => {
            // No resolvable issuer identity: neither signature nor trust
            // can be established.
            checks.untampered = CheckResult::Fail;
            checks.trusted_issuer = CheckResult::Fail;
        }
    }

    // Credential-type metadata gates trust and drives the revocation
    // check.
    let credential_types = credential_types_of(&decoded.claims);
    let mut revocable = false;
    for credential_type in &credential_types {
        let metadata = match metadata_by_type.get(credential_type) {
            Some(metadata) => Ok(metadata.clone()),
            None => registry.credential_type_metadata(credential_type).await,
        };
        match metadata {
            Ok(metadata) => {
                revocable = revocable || metadata.revocable;
                metadata_by_type.insert(credential_type.clone(), metadata);
            }
            Err(ResolutionError::Unavailable(_)) => {
                if checks.trusted_issuer == CheckResult::Pass {
                    checks.trusted_issuer = CheckResult::DependencyResolutionError;
                }
            }
            Err(_) => {
                checks.trusted_issuer = CheckResult::Fail;
            }
        }
    }

    checks.unexpired = expiry_check(&decoded.claims);
    checks.unrevoked = if revocable {
        revocation_check(&decoded.claims)
    } else {
        CheckResult::NotChecked
    };

    CredentialCheckResult {
        id: raw.id.clone(),
        credential: Some(decoded.claims),
        credential_checks: checks,
    }
}

fn credential_types_of(claims: &Value) -> Vec<String> {
    claims
        .pointer("/vc/type")
        .and_then(Value::as_array)
        .map(|types| {
            types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| *t != "VerifiableCredential")
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn expiry_check(claims: &Value) -> CheckResult {
    // Epoch-seconds `exp` claim wins; falls back to `vc.expirationDate`.
    if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
        let expires = Timestamp::parse("1970-01-01T00:00:00Z")
            .map(|epoch| epoch.plus_seconds(exp))
            .ok();
        return match expires {
            Some(expires) if Timestamp::now() > expires => CheckResult::Fail,
            Some(_) => CheckResult::Pass,
            None => CheckResult::Fail,
        };
    }
    if let Some(date) = claims.pointer("/vc/expirationDate").and_then(Value::as_str) {
        return match Timestamp::parse(date) {
            Ok(expires) if Timestamp::now() > expires => CheckResult::Fail,
            Ok(_) => CheckResult::Pass,
            Err(_) => CheckResult::Fail,
        };
    }
    // Non-expiring credential.
    CheckResult::Pass
}

fn revocation_check(claims: &Value) -> CheckResult {
    match claims
        .pointer("/vc/credentialStatus/revoked")
        .and_then(Value::as_bool)
    {
        Some(true) => CheckResult::Fail,
        _ => CheckResult::Pass,
    }
}

/// Layered policy guard over verification results.
///
/// Returns [`PaymentRequiredError`] when any credential whose checks all
/// passed has a type that consumes a voucher and no voucher was
/// supplied. This runs on top of verification, never inside it.
pub fn check_payment_requirement(
    results: &[CredentialCheckResult],
    voucher_present: bool,
    metadata_by_type: &HashMap<String, CredentialTypeMetadata>,
) -> Result<(), PaymentRequiredError> {
    if voucher_present {
        return Ok(());
    }
    for result in results {
        if !result.credential_checks.all_passed() {
            continue;
        }
        let Some(claims) = &result.credential else {
            continue;
        };
        for credential_type in credential_types_of(claims) {
            if metadata_by_type
                .get(&credential_type)
                .is_some_and(|m| m.requires_voucher)
            {
                return Err(PaymentRequiredError { credential_type });
            }
        }
    }
    Ok(())
}
