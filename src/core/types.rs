//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Fingerprint`] - SHA-1 content hash (40 lowercase hex characters)
//! - [`ElementName`] - Validated name of an artifact, container or unit
//! - [`StateId`] - Unique identifier minted for every commit
//! - [`UtcTimestamp`] - RFC3339 timestamp with microsecond precision
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use strata::core::types::{ElementName, Fingerprint};
//!
//! let name = ElementName::new("notes.txt").unwrap();
//! let fp = Fingerprint::new("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
//!
//! assert!(ElementName::new("a/b").is_err());
//! assert!(Fingerprint::new("not-a-sha").is_err());
//! # let _ = (name, fp);
//! ```

use chrono::SubsecRound;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::codec::DELIMITER;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid element name: {0}")]
    InvalidName(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// A SHA-1 content fingerprint.
///
/// Fingerprints are normalized to lowercase. The absence of a fingerprint
/// (a vanished workspace entity, a temporary commit) is modelled as
/// `Option<Fingerprint>` and encoded as the literal `null`.
///
/// # Example
///
/// ```
/// use strata::core::types::Fingerprint;
///
/// let fp = Fingerprint::new("DA39A3EE5E6B4B0D3255BFEF95601890AFD80709").unwrap();
/// assert_eq!(fp.as_str(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
/// assert_eq!(fp.short(8), "da39a3ee");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Encoded form of an absent fingerprint.
    pub const NULL: &'static str = "null";

    /// Create a new validated fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidFingerprint` unless the input is 40 hex characters.
    pub fn new(hex: impl Into<String>) -> Result<Self, TypeError> {
        let hex = hex.into().to_ascii_lowercase();
        Self::validate(&hex)?;
        Ok(Self(hex))
    }

    /// Wrap a digest produced by the hasher. The caller guarantees validity.
    pub(crate) fn from_digest(hex: String) -> Self {
        debug_assert_eq!(hex.len(), 40);
        Self(hex)
    }

    /// Parse a possibly-null fingerprint field.
    ///
    /// ```
    /// use strata::core::types::Fingerprint;
    ///
    /// assert_eq!(Fingerprint::parse_nullable("null").unwrap(), None);
    /// assert!(Fingerprint::parse_nullable("da39a3ee5e6b4b0d3255bfef95601890afd80709")
    ///     .unwrap()
    ///     .is_some());
    /// ```
    pub fn parse_nullable(field: &str) -> Result<Option<Self>, TypeError> {
        if field == Self::NULL {
            Ok(None)
        } else {
            Self::new(field).map(Some)
        }
    }

    /// Encode a possibly-null fingerprint.
    pub fn encode_nullable(fp: Option<&Fingerprint>) -> &str {
        fp.map(Fingerprint::as_str).unwrap_or(Self::NULL)
    }

    /// Get an abbreviated form of the fingerprint.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    fn validate(hex: &str) -> Result<(), TypeError> {
        if hex.len() != 40 {
            return Err(TypeError::InvalidFingerprint(format!(
                "expected 40 hex characters, got {}",
                hex.len()
            )));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidFingerprint(
                "fingerprint must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated element name.
///
/// Names are single path components:
/// - Cannot be empty, `.` or `..`
/// - Cannot contain `/`, `\`, line breaks or the field delimiter `::>>`
///
/// # Example
///
/// ```
/// use strata::core::types::ElementName;
///
/// assert!(ElementName::new("src").is_ok());
/// assert!(ElementName::new("").is_err());
/// assert!(ElementName::new("..").is_err());
/// assert!(ElementName::new("a::>>b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElementName(String);

impl ElementName {
    /// Create a new validated element name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidName("name cannot be empty".into()));
        }
        if name == "." || name == ".." {
            return Err(TypeError::InvalidName(format!(
                "'{name}' is a reserved path component"
            )));
        }
        for c in ['/', '\\', '\n', '\r'] {
            if name.contains(c) {
                return Err(TypeError::InvalidName(format!(
                    "name cannot contain {:?}",
                    c
                )));
            }
        }
        if name.contains(DELIMITER) {
            return Err(TypeError::InvalidName(format!(
                "name cannot contain the field delimiter '{DELIMITER}'"
            )));
        }
        Ok(())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ElementName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ElementName> for String {
    fn from(name: ElementName) -> Self {
        name.0
    }
}

impl AsRef<str> for ElementName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets maps keyed by name be queried with a plain `&str`.
impl std::borrow::Borrow<str> for ElementName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier minted for each State.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateId(String);

impl StateId {
    /// Generate a new random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a StateId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp in RFC3339 format.
///
/// Precision is truncated to microseconds so that the encoded form
/// round-trips exactly through storage.
///
/// # Example
///
/// ```
/// use strata::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// let parsed = UtcTimestamp::parse(&now.to_string()).unwrap();
/// assert_eq!(now, parsed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self::from_datetime(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt.trunc_subsecs(6))
    }

    /// Parse an RFC3339 timestamp.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| Self::from_datetime(dt.with_timezone(&chrono::Utc)))
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s}: {e}")))
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod fingerprint {
        use super::*;

        #[test]
        fn valid_sha1() {
            assert!(Fingerprint::new("da39a3ee5e6b4b0d3255bfef95601890afd80709").is_ok());
        }

        #[test]
        fn normalizes_to_lowercase() {
            let fp = Fingerprint::new("DA39A3EE5E6B4B0D3255BFEF95601890AFD80709").unwrap();
            assert_eq!(fp.as_str(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        }

        #[test]
        fn sha256_length_rejected() {
            let long = "abc123def4567890abc123def4567890abc123def4567890abc123def456789a";
            assert!(Fingerprint::new(long).is_err());
        }

        #[test]
        fn non_hex_rejected() {
            assert!(Fingerprint::new("xyz123def4567890abc123def4567890abc12345").is_err());
        }

        #[test]
        fn nullable_roundtrip() {
            assert_eq!(Fingerprint::parse_nullable("null").unwrap(), None);
            let fp = Fingerprint::new("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
            let encoded = Fingerprint::encode_nullable(Some(&fp)).to_string();
            assert_eq!(Fingerprint::parse_nullable(&encoded).unwrap(), Some(fp));
            assert_eq!(Fingerprint::encode_nullable(None), "null");
        }

        #[test]
        fn short_form() {
            let fp = Fingerprint::new("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
            assert_eq!(fp.short(7), "da39a3e");
            assert_eq!(fp.short(100), fp.as_str());
        }

        #[test]
        fn serde_roundtrip() {
            let fp = Fingerprint::new("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
            let json = serde_json::to_string(&fp).unwrap();
            let parsed: Fingerprint = serde_json::from_str(&json).unwrap();
            assert_eq!(fp, parsed);
        }
    }

    mod element_name {
        use super::*;

        #[test]
        fn valid_names() {
            assert!(ElementName::new("file.txt").is_ok());
            assert!(ElementName::new(".hidden").is_ok());
            assert!(ElementName::new("with space").is_ok());
            assert!(ElementName::new("unit-1").is_ok());
        }

        #[test]
        fn separators_rejected() {
            assert!(ElementName::new("a/b").is_err());
            assert!(ElementName::new("a\\b").is_err());
        }

        #[test]
        fn delimiter_rejected() {
            assert!(ElementName::new("x::>>y").is_err());
        }

        #[test]
        fn reserved_components_rejected() {
            assert!(ElementName::new(".").is_err());
            assert!(ElementName::new("..").is_err());
        }

        #[test]
        fn line_breaks_rejected() {
            assert!(ElementName::new("a\nb").is_err());
            assert!(ElementName::new("a\rb").is_err());
        }
    }

    mod utc_timestamp {
        use super::*;

        #[test]
        fn display_parse_roundtrip() {
            let ts = UtcTimestamp::now();
            let parsed = UtcTimestamp::parse(&ts.to_string()).unwrap();
            assert_eq!(ts, parsed);
            assert_eq!(ts.to_string(), parsed.to_string());
        }

        #[test]
        fn garbage_rejected() {
            assert!(UtcTimestamp::parse("yesterday").is_err());
        }
    }

    #[test]
    fn state_ids_are_unique() {
        assert_ne!(StateId::generate(), StateId::generate());
    }
}
