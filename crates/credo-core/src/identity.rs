//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the engine.
//! Each identifier is a distinct type — you cannot pass an [`OfferId`]
//! where an [`ExchangeId`] is expected.
//!
//! ## Validation
//!
//! String-based identifiers ([`Did`], [`LedgerAddress`]) validate format
//! at construction time. UUID-based identifiers ([`ExchangeId`],
//! [`OfferId`], [`DisclosureId`]) are always valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Parse an identifier from its string form.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::InvalidIdentifier`] if the string
            /// is not a valid UUID.
            pub fn parse(s: &str) -> Result<Self, ValidationError> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    ValidationError::InvalidIdentifier {
                        value: s.to_string(),
                        reason: e.to_string(),
                    }
                })
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// A unique identifier for a credential exchange session between the
    /// operator and a holder wallet.
    ExchangeId
}

uuid_id! {
    /// A unique identifier for a credential offer held in an exchange.
    OfferId
}

uuid_id! {
    /// A unique identifier for a disclosure (presentation request) session.
    DisclosureId
}

// ---------------------------------------------------------------------------
// String-based identifiers (validated at construction)
// ---------------------------------------------------------------------------

/// W3C Decentralized Identifier (DID).
///
/// Format: `did:<method>:<method-specific-id>` where method is lowercase
/// alphanumeric and method-specific-id is non-empty. A fragment suffix
/// (`#key-1`) is accepted and retained; [`Did::strip_fragment`] produces
/// the controller DID without it.
///
/// Reference: <https://www.w3.org/TR/did-core/#did-syntax>
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Did(String);

impl Did {
    /// Create a DID from a string, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDid`] if the string does not
    /// match the `did:method:identifier` format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let Some(rest) = s.strip_prefix("did:") else {
            return Err(ValidationError::InvalidDid(s.to_string()));
        };
        let Some((method, identifier)) = rest.split_once(':') else {
            return Err(ValidationError::InvalidDid(s.to_string()));
        };

        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidDid(s.to_string()));
        }

        // Identifier must be non-empty before any fragment.
        let base = identifier.split('#').next().unwrap_or("");
        if base.is_empty() {
            return Err(ValidationError::InvalidDid(s.to_string()));
        }

        Ok(())
    }

    /// Access the DID string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the DID method (the part between the first and second colons).
    pub fn method(&self) -> &str {
        let rest = &self.0[4..];
        match rest.find(':') {
            Some(pos) => &rest[..pos],
            None => rest,
        }
    }

    /// Return the DID without any `#fragment` suffix.
    ///
    /// Verification-method references like `did:web:issuer.example#key-1`
    /// resolve against the controller DID, which is the part before `#`.
    pub fn strip_fragment(&self) -> Did {
        match self.0.split_once('#') {
            Some((base, _)) => Did(base.to_string()),
            None => self.clone(),
        }
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger account address: `0x` followed by 40 hex characters.
///
/// Stored lowercased so that addresses compare and key consistently
/// regardless of the checksum casing a wallet supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerAddress(String);

impl LedgerAddress {
    /// Create a ledger address from a string, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidLedgerAddress`] if the string is
    /// not `0x` followed by exactly 40 hex characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let Some(hex) = s.strip_prefix("0x") else {
            return Err(ValidationError::InvalidLedgerAddress(s));
        };
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidLedgerAddress(s));
        }
        Ok(Self(s.to_lowercase()))
    }

    /// Access the address in canonical lowercase form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
