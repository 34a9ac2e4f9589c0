//! Citation keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TagError;

/// A validated citation key.
///
/// Keys name files (`<CK>.pdf`, `<CK>.bib`), so they may not contain path
/// separators, whitespace or dots. A dot in a file stem marks a variant such
/// as `CMT12.slides.pdf`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CitationKey(String);

impl CitationKey {
    pub fn new(key: impl Into<String>) -> Result<Self, TagError> {
        let key = key.into();
        let reason = if key.is_empty() {
            Some("empty")
        } else if key.contains(['/', '\\']) {
            Some("contains a path separator")
        } else if key.contains('.') {
            Some("contains a dot")
        } else if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Some("contains whitespace or control characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(TagError::InvalidKey { key, reason }),
            None => Ok(Self(key)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this key with the given extension (`pdf`, `slides.pdf`).
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl fmt::Display for CitationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CitationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CitationKey {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for CitationKey {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CitationKey> for String {
    fn from(key: CitationKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TD17")]
    #[case("tomescu17catena")]
    #[case("ABC+19")]
    #[case("Müller20")]
    fn accepts_keys(#[case] key: &str) {
        assert_eq!(CitationKey::new(key).unwrap().as_str(), key);
    }

    #[rstest]
    #[case("")]
    #[case("a/b")]
    #[case("CMT12.slides")]
    #[case("two words")]
    #[case("..")]
    fn rejects_keys(#[case] key: &str) {
        assert!(CitationKey::new(key).is_err());
    }

    #[test]
    fn file_names() {
        let key: CitationKey = " TD17 ".parse().unwrap();
        assert_eq!(key.file_name("pdf"), "TD17.pdf");
        assert_eq!(key.file_name("slides.pdf"), "TD17.slides.pdf");
    }

    #[test]
    fn serde_validates() {
        let key: CitationKey = serde_json::from_str("\"TD17\"").unwrap();
        assert_eq!(key.to_string(), "TD17");
        assert!(serde_json::from_str::<CitationKey>("\"a/b\"").is_err());
    }
}
