//! # Canonical Serialization — RFC 8785 Byte Production
//!
//! This module defines [`CanonicalBytes`], the sole construction path for
//! bytes used in content-hash computation across the engine.
//!
//! ## Security Invariant
//!
//! The inner `Vec<u8>` is private. The only way to construct
//! `CanonicalBytes` is through [`CanonicalBytes::new()`], which strips
//! `null` object members and then serializes with `serde_jcs` (RFC 8785:
//! sorted keys, compact separators, deterministic number form). Any
//! function computing a content hash must accept `&CanonicalBytes`, so no
//! code path can hash non-canonical bytes.
//!
//! ## Null stripping
//!
//! Offer payloads arrive from vendors as loosely-shaped JSON in which an
//! absent field and an explicit `null` mean the same thing. Both forms
//! must produce the same content hash, so `null` object members are
//! removed recursively before serialization. Array elements are never
//! removed — `[1, null, 2]` is a different document from `[1, 2]`.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by null-stripped RFC 8785 canonicalization.
///
/// The inner `Vec<u8>` is private — downstream code cannot construct
/// `CanonicalBytes` except through [`CanonicalBytes::new()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// Strips `null` object members recursively, then serializes in JCS
    /// canonical form. This is the ONLY way to construct `CanonicalBytes`;
    /// all content hashing flows through this constructor.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::SerializationFailed`] if the value
    /// cannot be represented as JSON or JCS serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let stripped = strip_null_members(value);
        let s = serde_jcs::to_string(&stripped)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for hash computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively remove `null` object members.
///
/// Scalars pass through unchanged. Array elements are recursed but never
/// removed, preserving positional semantics.
fn strip_null_members(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let stripped: serde_json::Map<String, Value> = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_null_members(v)))
                .collect();
            Value::Object(stripped)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(strip_null_members).collect()),
        other => other,
    }
}
