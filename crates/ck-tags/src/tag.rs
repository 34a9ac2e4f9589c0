//! Hierarchical tag paths.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TagError;

/// A normalized tag path such as `accumulators/merkle`.
///
/// Each segment is one hierarchy level and one directory under the tag root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Parse tag input, normalizing separators and whitespace.
    ///
    /// - Trims whitespace around every segment
    /// - Accepts backslashes as separators
    /// - Drops leading, trailing and repeated slashes
    /// - Strips a leading `#` (tags are often written `#queue/to-read`)
    ///
    /// Segments starting with `.` are rejected: the tag tree scan skips
    /// hidden directories, so such a tag could be written but never read.
    ///
    /// # Examples
    /// ```
    /// use ck_tags::Tag;
    /// assert_eq!(Tag::parse("  #queue / to-read/ ").unwrap().as_str(), "queue/to-read");
    /// assert!(Tag::parse("a/../b").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, TagError> {
        let normalized = input.trim().trim_start_matches('#').replace('\\', "/");
        let segments: Vec<&str> = normalized
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let invalid = |reason| TagError::InvalidTag {
            tag: input.to_string(),
            reason,
        };

        if segments.is_empty() {
            return Err(invalid("empty"));
        }
        if segments.iter().any(|s| s.starts_with('.')) {
            return Err(invalid("segments may not start with '.'"));
        }
        if segments.iter().any(|s| s.chars().any(char::is_control)) {
            return Err(invalid("contains control characters"));
        }

        Ok(Self(segments.join("/")))
    }

    /// Build a tag from a directory path relative to the tag root.
    ///
    /// The directory names are taken literally: a name that [`Tag::parse`]
    /// would rewrite (`#todo`, ` x `, `a\b`) is an error, since the
    /// resulting tag would live in a different directory.
    pub fn from_relative_path(path: &Path) -> Result<Self, TagError> {
        let invalid = |reason| TagError::InvalidTag {
            tag: path.display().to_string(),
            reason,
        };

        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    segments.push(part.to_str().ok_or_else(|| invalid("not UTF-8"))?)
                }
                Component::CurDir => {}
                _ => return Err(invalid("not a relative path below the tag root")),
            }
        }

        let literal = segments.join("/");
        let tag = Self::parse(&literal)?;
        if tag.0 != literal {
            return Err(invalid("directory name is not a normalized tag"));
        }
        Ok(tag)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments (e.g., ["queue", "to-read"]).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last segment.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Number of separators (a top-level tag has depth 0).
    pub fn depth(&self) -> usize {
        self.0.matches('/').count()
    }

    /// Parent tag (e.g., `queue` for `queue/to-read`).
    pub fn parent(&self) -> Option<Tag> {
        self.0.rfind('/').map(|i| Tag(self.0[..i].to_string()))
    }

    /// Every proper ancestor, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0
            .char_indices()
            .filter(|(_, c)| *c == '/')
            .map(|(i, _)| Tag(self.0[..i].to_string()))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
    }

    /// Check if this tag is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Tag) -> bool {
        other.is_descendant_of(self)
    }

    /// Check if this tag is a proper descendant of `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Tag) -> bool {
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    /// This tag or one of its descendants.
    pub fn covers(&self, other: &Tag) -> bool {
        self == other || other.is_descendant_of(self)
    }

    /// Relative directory path for this tag under a tag root.
    pub fn to_relative_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}
