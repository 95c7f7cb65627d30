use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a news article.
///
/// Ids are allocated once by the command store from an increasing sequence
/// and shared by every revision of the article and by its projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsId(i64);

impl NewsId {
    /// Creates a news id from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Ids are positive; zero and negative values never name an article.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for NewsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NewsId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<NewsId> for i64 {
    fn from(id: NewsId) -> Self {
        id.0
    }
}

/// Revision number of a news article, used for optimistic concurrency control.
///
/// Versions start at 1 for the first revision and increment by 1 for each
/// subsequent revision of the same article.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of an article with no revisions.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Position of a revision in the command store's commit log.
///
/// Positions increase with commit order; position 0 precedes every entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LogPosition(i64);

impl LogPosition {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The position before the first log entry.
    pub fn start() -> Self {
        Self(0)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for LogPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category a news service is dedicated to ("politics", "sports", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NewsType(String);

impl NewsType {
    /// Parses a news type, accepting lowercase ASCII letters, digits, `-` and `_`.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidNewsType> {
        let value = value.into();
        let valid = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if valid {
            Ok(Self(value))
        } else {
            Err(InvalidNewsType(value))
        }
    }

    /// Returns the news type as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NewsType {
    fn default() -> Self {
        Self("politics".to_string())
    }
}

impl std::fmt::Display for NewsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NewsType {
    type Error = InvalidNewsType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<NewsType> for String {
    fn from(news_type: NewsType) -> Self {
        news_type.0
    }
}

/// Error returned when a news type string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid news type: {0:?}")]
pub struct InvalidNewsType(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn news_id_validity() {
        assert!(NewsId::new(1).is_valid());
        assert!(!NewsId::new(0).is_valid());
        assert!(!NewsId::new(-4).is_valid());
    }

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
    }

    #[test]
    fn version_initial_and_first() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::first().as_i64(), 1);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn news_type_defaults_to_politics() {
        assert_eq!(NewsType::default().as_str(), "politics");
    }

    #[test]
    fn news_type_rejects_malformed_values() {
        assert!(NewsType::parse("sports").is_ok());
        assert!(NewsType::parse("famous-people").is_ok());
        assert!(NewsType::parse("").is_err());
        assert!(NewsType::parse("Sports").is_err());
        assert!(NewsType::parse("world news").is_err());
    }

    #[test]
    fn news_type_is_validated_when_deserialized() {
        let json = serde_json::to_string(&NewsType::parse("sports").unwrap()).unwrap();
        assert_eq!(json, "\"sports\"");
        let parsed: NewsType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_str(), "sports");

        let err = serde_json::from_str::<NewsType>("\"World News\"").unwrap_err();
        assert!(err.to_string().contains("invalid news type"));
        assert_eq!(
            InvalidNewsType("X".into()).to_string(),
            "invalid news type: \"X\""
        );
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&NewsId::new(7)).unwrap();
        assert_eq!(json, "7");
        let version: Version = serde_json::from_str("3").unwrap();
        assert_eq!(version, Version::new(3));
    }
}
