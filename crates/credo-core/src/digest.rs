//! # Content Hashing
//!
//! Defines [`ContentHash`] and the [`content_hash`] function used for
//! content-addressed offer deduplication and link-code commitments.
//!
//! ## Security Invariant
//!
//! A [`ContentHash`] can only be computed from
//! [`CanonicalBytes`][crate::CanonicalBytes]. This ensures every hash in
//! the system was produced from properly canonicalized data, so two
//! structurally identical documents always hash identically.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// The hash algorithm that produced a [`ContentHash`].
///
/// Only SHA-256 is supported today. The tag is carried on the wire so
/// that verifiers can select the right function if the algorithm ever
/// rotates without invalidating stored hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashType {
    /// SHA-256, serialized as `"sha-256"`.
    #[serde(rename = "sha-256")]
    Sha256,
}

impl HashType {
    /// The wire name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashType::Sha256 => "sha-256",
        }
    }
}

/// A content hash with its algorithm tag.
///
/// Wire shape: `{"type": "sha-256", "value": "<lowercase hex>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash {
    /// The hash algorithm that produced this hash.
    #[serde(rename = "type")]
    pub hash_type: HashType,
    /// The digest as a lowercase hex string.
    pub value: String,
}

impl ContentHash {
    /// Create a SHA-256 content hash from raw digest bytes.
    pub fn sha256(bytes: [u8; 32]) -> Self {
        Self {
            hash_type: HashType::Sha256,
            value: bytes.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hash_type.as_str(), self.value)
    }
}

/// Compute the SHA-256 content hash of canonical bytes.
///
/// The signature enforces the canonicalization invariant: there is no way
/// to hash bytes that did not pass through
/// [`CanonicalBytes::new()`][crate::CanonicalBytes::new].
pub fn content_hash(canonical: &CanonicalBytes) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    ContentHash::sha256(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(value: serde_json::Value) -> CanonicalBytes {
        CanonicalBytes::new(&value).unwrap()
    }

    #[test]
    fn hash_is_deterministic() {
        let a = content_hash(&canonical(serde_json::json!({"a": 1, "b": 2})));
        let b = content_hash(&canonical(serde_json::json!({"b": 2, "a": 1})));
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_different_hash() {
        let a = content_hash(&canonical(serde_json::json!({"a": 1})));
        let b = content_hash(&canonical(serde_json::json!({"a": 2})));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_value_is_64_hex_chars() {
        let h = content_hash(&canonical(serde_json::json!({})));
        assert_eq!(h.value.len(), 64);
        assert!(h.value.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h.value, h.value.to_lowercase());
    }

    #[test]
    fn wire_shape_uses_type_and_value() {
        let h = content_hash(&canonical(serde_json::json!({"x": true})));
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["type"], "sha-256");
        assert!(json["value"].is_string());
    }

    #[test]
    fn wire_roundtrip() {
        let h = content_hash(&canonical(serde_json::json!([1, 2, 3])));
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn display_format() {
        let h = ContentHash::sha256([0u8; 32]);
        assert_eq!(format!("{h}"), format!("sha-256:{}", "0".repeat(64)));
    }

    #[test]
    fn known_vector_empty_object() {
        // sha256("{}")
        let h = content_hash(&canonical(serde_json::json!({})));
        assert_eq!(
            h.value,
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }
}
