//! # Temporal Types
//!
//! UTC-only timestamp type for the exchange engine. All timestamps are
//! stored in UTC with second-level precision and a `Z` suffix in
//! serialized form.
//!
//! ## Design Decision
//!
//! Exchange event logs, challenge expiries and credential validity windows
//! are compared across services run by different parties. To prevent
//! ambiguity in those comparisons, all timestamps are UTC. Local time
//! conversion is a presentation concern handled by clients.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC timestamp with second-level precision.
///
/// Serializes to ISO 8601 format with `Z` suffix (e.g., `2026-01-15T12:00:00Z`).
/// Subsecond precision is truncated during canonicalization to ensure
/// deterministic content-hash computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parse a timestamp from an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTimestamp`] if the string does
    /// not parse as RFC 3339.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ValidationError::InvalidTimestamp {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Access the underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Return a timestamp offset by the given number of seconds.
    ///
    /// Saturates at the chrono range bound in the direction of the
    /// offset instead of overflowing. `seconds` may come straight from
    /// untrusted input (an `exp` claim), so the full `i64` range must be
    /// representable.
    pub fn plus_seconds(&self, seconds: i64) -> Self {
        let bound = if seconds < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        };
        Self(
            Duration::try_seconds(seconds)
                .and_then(|delta| self.0.checked_add_signed(delta))
                .unwrap_or(bound),
        )
    }

    /// Whole seconds elapsed from `self` to `other` (negative if `other`
    /// is earlier).
    pub fn seconds_until(&self, other: &Timestamp) -> i64 {
        (other.0 - self.0).num_seconds()
    }

    /// Return the timestamp as an ISO 8601 string with Z suffix,
    /// truncated to seconds (matching canonicalization rules).
    pub fn to_canonical_string(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_has_z_suffix() {
        let ts = Timestamp::now();
        assert!(ts.to_canonical_string().ends_with('Z'));
    }

    #[test]
    fn parse_roundtrip() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        assert_eq!(ts.to_canonical_string(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn parse_normalizes_offset_to_utc() {
        let ts = Timestamp::parse("2026-01-15T14:00:00+02:00").unwrap();
        assert_eq!(ts.to_canonical_string(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Timestamp::parse("not-a-date").is_err());
        assert!(Timestamp::parse("2026-01-15").is_err());
    }

    #[test]
    fn plus_seconds_and_ordering() {
        let base = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let later = base.plus_seconds(300);
        assert!(later > base);
        assert_eq!(base.seconds_until(&later), 300);
        assert_eq!(later.seconds_until(&base), -300);
    }

    #[test]
    fn plus_seconds_saturates_toward_the_offset_sign() {
        let base = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();

        let far_future = base.plus_seconds(i64::MAX);
        assert!(far_future > base);
        // Saturation is stable: the bound plus anything stays the bound.
        assert_eq!(far_future, far_future.plus_seconds(i64::MAX));

        let far_past = base.plus_seconds(i64::MIN);
        assert!(far_past < base);
        assert_eq!(far_past, far_past.plus_seconds(i64::MIN));
    }

    #[test]
    fn plus_seconds_negative() {
        let base = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        let earlier = base.plus_seconds(-60);
        assert_eq!(earlier.to_canonical_string(), "2026-01-15T11:59:00Z");
    }
}
