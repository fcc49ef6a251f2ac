//! # Compact EdDSA Token Codec
//!
//! Three-part compact tokens (`header.payload.signature`, base64url
//! without padding) signed with Ed25519. Used for proof-of-possession
//! tokens from holders and for the credential tokens the operator issues.
//!
//! Decoding is structural only; [`DecodedToken::verify_signature`] checks
//! the signature against a caller-resolved key. Key resolution policy
//! (embedded `jwk` vs referenced `kid`) lives in
//! [`proof`][crate::proof], not here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from token encoding, decoding and verification.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The token does not have the `header.payload.signature` shape.
    #[error("malformed token: {0}")]
    Malformed(&'static str),

    /// A token segment was not valid base64url.
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A token segment was not valid JSON.
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Key material could not be interpreted as an Ed25519 key.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The signature does not verify against the supplied key.
    #[error("signature verification failed")]
    BadSignature,
}

/// An Ed25519 public key in JWK form.
///
/// `{kty: "OKP", crv: "Ed25519", x: <base64url key bytes>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    /// Key type, `"OKP"`.
    pub kty: String,
    /// Curve, `"Ed25519"`.
    pub crv: String,
    /// Base64url-encoded 32-byte public key.
    pub x: String,
}

impl PublicJwk {
    /// Build the JWK form of a verifying key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: URL_SAFE_NO_PAD.encode(key.as_bytes()),
        }
    }

    /// Recover the verifying key from the JWK.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidKey`] for non-Ed25519 parameters or
    /// malformed key bytes.
    pub fn verifying_key(&self) -> Result<VerifyingKey, TokenError> {
        if self.kty != "OKP" || self.crv != "Ed25519" {
            return Err(TokenError::InvalidKey(format!(
                "unsupported key parameters kty={} crv={}",
                self.kty, self.crv
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.x)
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TokenError::InvalidKey("expected 32 key bytes".to_string()))?;
        VerifyingKey::from_bytes(&bytes).map_err(|e| TokenError::InvalidKey(e.to_string()))
    }

    /// RFC 7638 JWK thumbprint: canonical JSON of the required members,
    /// SHA-256, base64url.
    pub fn thumbprint(&self) -> Result<String, TokenError> {
        #[derive(Serialize)]
        struct Required<'a> {
            crv: &'a str,
            kty: &'a str,
            x: &'a str,
        }
        let canonical = serde_jcs::to_string(&Required {
            crv: &self.crv,
            kty: &self.kty,
            x: &self.x,
        })?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }
}

/// Token header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm; always `"EdDSA"` here.
    pub alg: String,
    /// Token type, conventionally `"JWT"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Key reference (a DID, optionally with a `#fragment`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Embedded public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<PublicJwk>,
}

impl TokenHeader {
    /// A plain EdDSA/JWT header with no key hints.
    pub fn eddsa() -> Self {
        Self {
            alg: "EdDSA".to_string(),
            typ: Some("JWT".to_string()),
            kid: None,
            jwk: None,
        }
    }

    /// An EdDSA/JWT header carrying a key reference.
    pub fn with_kid(kid: impl Into<String>) -> Self {
        Self {
            kid: Some(kid.into()),
            ..Self::eddsa()
        }
    }

    /// An EdDSA/JWT header carrying an embedded public key.
    pub fn with_jwk(jwk: PublicJwk) -> Self {
        Self {
            jwk: Some(jwk),
            ..Self::eddsa()
        }
    }
}

/// A structurally decoded token, signature not yet verified.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// The decoded header.
    pub header: TokenHeader,
    /// The decoded claims.
    pub claims: Value,
    signing_input: String,
    signature: Vec<u8>,
}

impl DecodedToken {
    /// Verify the token signature against a resolved key.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::BadSignature`] when the signature does not
    /// verify.
    pub fn verify_signature(&self, key: &VerifyingKey) -> Result<(), TokenError> {
        let signature = Signature::from_slice(&self.signature)
            .map_err(|_| TokenError::BadSignature)?;
        key.verify(self.signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::BadSignature)
    }

    /// Fetch a string claim by name.
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }
}

/// Sign claims into a compact token.
pub fn sign_claims(
    header: &TokenHeader,
    claims: &impl Serialize,
    key: &SigningKey,
) -> Result<String, TokenError> {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?);
    let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = key.sign(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// Structurally decode a compact token without verifying its signature.
pub fn decode(token: &str) -> Result<DecodedToken, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed("expected three dot-separated parts"));
    };

    let header: TokenHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64)?)?;
    let claims: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64)?)?;
    let signature = URL_SAFE_NO_PAD.decode(signature_b64)?;

    Ok(DecodedToken {
        header,
        claims,
        signing_input: format!("{header_b64}.{claims_b64}"),
        signature,
    })
}
