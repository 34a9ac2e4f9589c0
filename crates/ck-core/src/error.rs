//! Error types for ck-core

use std::io;
use std::path::{Path, PathBuf};

use ck_bibtex::ParseError;
use ck_tags::{CitationKey, Tag, TagError};
use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, CkError>;

/// Main error type for library operations
#[derive(Error, Debug)]
pub enum CkError {
    /// Candidate key already names a paper; the caller must pick another.
    #[error("citation key '{key}' is already in use")]
    KeyCollision { key: CitationKey },

    /// No document or metadata file for the key.
    #[error("no .pdf or .bib file for '{key}' in {}", .store.display())]
    StoreEntryMissing { key: CitationKey, store: PathBuf },

    /// Metadata file did not parse.
    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// A multi-tag rename applied some tags but not others.
    #[error("renamed '{old}' to '{new}' but could not re-apply: {}", join_tags(.failed))]
    PartialRenameFailure {
        old: CitationKey,
        new: CitationKey,
        failed: Vec<Tag>,
    },

    /// The record lacks a field the selected key policy needs.
    #[error("record has no usable '{field}' field")]
    IncompleteRecord { field: &'static str },

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

fn join_tags(tags: &[Tag]) -> String {
    tags.iter().map(Tag::as_str).collect::<Vec<_>>().join(", ")
}

/// Attach the offending path to an I/O error.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| CkError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        let key = CitationKey::new("TD17").unwrap();
        let err = CkError::KeyCollision { key: key.clone() };
        assert_eq!(err.to_string(), "citation key 'TD17' is already in use");

        let err = CkError::PartialRenameFailure {
            old: key,
            new: CitationKey::new("TD17b").unwrap(),
            failed: vec![Tag::parse("a/b").unwrap(), Tag::parse("c").unwrap()],
        };
        assert!(err.to_string().ends_with("re-apply: a/b, c"));
    }

    #[test]
    fn io_errors_carry_paths() {
        let err = std::fs::read("/definitely/not/here.bib")
            .at(Path::new("/definitely/not/here.bib"))
            .unwrap_err();
        assert!(err.to_string().starts_with("/definitely/not/here.bib: "));
    }
}
