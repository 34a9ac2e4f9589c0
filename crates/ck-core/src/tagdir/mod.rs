//! The tag symlink tree.
//!
//! A tag `queue/to-read` on key `TD17` is the pair of links
//! `<root>/queue/to-read/TD17.pdf` and `<root>/queue/to-read/TD17.bib`,
//! each pointing at the store file of the same name. Directories are the
//! tags; there is no other record of them.

mod mutate;
mod scan;

use std::io;
use std::path::{Path, PathBuf};

use ck_tags::{CitationKey, Tag, TagIndex};

pub use mutate::{RelinkOutcome, RenameReport, TagMutator, TagRelink};
pub use scan::{scan, Inconsistency};

use crate::error::Result;
use crate::store::FileKind;

/// Root of a tag tree
#[derive(Debug, Clone)]
pub struct TagDir {
    root: PathBuf,
}

impl TagDir {
    /// The root does not need to exist yet; the first tag creates it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the links for `tag`.
    pub fn tag_path(&self, tag: &Tag) -> PathBuf {
        self.root.join(tag.to_relative_path())
    }

    /// Where the `kind` link of `key` under `tag` lives.
    pub fn link_path(&self, tag: &Tag, key: &CitationKey, kind: FileKind) -> PathBuf {
        self.tag_path(tag).join(key.file_name(kind.extension()))
    }

    /// Fresh snapshot of the tree, with everything that looked wrong.
    pub fn scan(&self) -> Result<(TagIndex, Vec<Inconsistency>)> {
        scan::scan(&self.root)
    }

    /// Fresh snapshot of the tree; inconsistencies are only logged.
    pub fn index(&self) -> Result<TagIndex> {
        let (index, issues) = self.scan()?;
        for issue in &issues {
            tracing::debug!("{}", issue);
        }
        Ok(index)
    }
}

#[cfg(unix)]
pub(crate) fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_tag_segments() {
        let dir = TagDir::new("/lib/tags");
        let tag = Tag::parse("queue/to-read").unwrap();
        let key = CitationKey::new("TD17").unwrap();
        assert_eq!(dir.tag_path(&tag), PathBuf::from("/lib/tags/queue/to-read"));
        assert_eq!(
            dir.link_path(&tag, &key, FileKind::Bib),
            PathBuf::from("/lib/tags/queue/to-read/TD17.bib")
        );
    }

    #[test]
    fn missing_root_is_an_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TagDir::new(tmp.path().join("not-yet"));
        assert!(dir.index().unwrap().is_empty());
    }
}
