//! Applying and removing tags.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use ck_tags::{CitationKey, Tag};
use serde::Serialize;

use super::{make_symlink, Inconsistency, TagDir};
use crate::error::{CkError, IoResultExt, Result};
use crate::store::{parse_file_name, LibraryStore};

/// Writes tag links for keys of one store.
///
/// Every call goes straight to the filesystem; there is no index to keep in
/// sync. Each step is a single link or directory operation, so an
/// interrupted call leaves a tree that a later scan can make sense of.
#[derive(Debug, Clone, Copy)]
pub struct TagMutator<'a> {
    store: &'a LibraryStore,
    tags: &'a TagDir,
}

impl<'a> TagMutator<'a> {
    pub fn new(store: &'a LibraryStore, tags: &'a TagDir) -> Self {
        Self { store, tags }
    }

    /// Link the document and metadata files of `key` under `tag`.
    ///
    /// Returns `false` if every link was already there.
    pub fn apply_tag(&self, key: &CitationKey, tag: &Tag) -> Result<bool> {
        let kinds = self.store.linkable_kinds(key);
        if kinds.is_empty() {
            return Err(CkError::StoreEntryMissing {
                key: key.clone(),
                store: self.store.root().to_path_buf(),
            });
        }

        let dir = self.tags.tag_path(tag);
        fs::create_dir_all(&dir).at(&dir)?;

        let mut created = false;
        for kind in kinds {
            let link = self.tags.link_path(tag, key, kind);
            if fs::symlink_metadata(&link).is_ok() {
                tracing::debug!("{:?} already exists", link);
                continue;
            }
            make_symlink(&self.store.path_for(key, kind), &link).at(&link)?;
            created = true;
        }

        if created {
            tracing::info!("Tagged '{}' with '{}'", key, tag);
        } else {
            tracing::debug!("'{}' was already tagged '{}'", key, tag);
        }
        Ok(created)
    }

    /// Delete the links of `key` under `tag`, then prune emptied directories.
    ///
    /// Returns `false` if `key` was not tagged `tag`. Links with an
    /// upper-case extension are removed too.
    pub fn remove_tag(&self, key: &CitationKey, tag: &Tag) -> Result<bool> {
        let dir = self.tags.tag_path(tag);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("'{}' was not tagged '{}'", key, tag);
                return Ok(false);
            }
            Err(e) => return Err(e).at(&dir),
        };

        let mut doomed = Vec::new();
        for entry in entries {
            let entry = entry.at(&dir)?;
            let name = entry.file_name();
            let ours = name
                .to_str()
                .and_then(parse_file_name)
                .is_some_and(|(k, _)| &k == key);
            if ours && entry.file_type().at(&entry.path())?.is_symlink() {
                doomed.push(entry.path());
            }
        }

        if doomed.is_empty() {
            tracing::debug!("'{}' was not tagged '{}'", key, tag);
            return Ok(false);
        }
        for link in &doomed {
            fs::remove_file(link).at(link)?;
        }
        self.prune(tag)?;

        tracing::info!("Removed tag '{}' from '{}'", tag, key);
        Ok(true)
    }

    /// Remove every tag of `key`, including tags whose links are broken.
    ///
    /// Returns the tags that were removed.
    pub fn remove_all_tags(&self, key: &CitationKey) -> Result<BTreeSet<Tag>> {
        let tags = self.tags_on(key)?;
        for tag in &tags {
            self.remove_tag(key, tag)?;
        }
        Ok(tags)
    }

    /// Move every tag of `old` over to `new`.
    ///
    /// Meant to run right after the store files were renamed, when the links
    /// of `old` are broken. Removing an old link fails the whole call; a tag
    /// that cannot be applied to `new` is logged and reported, and the
    /// remaining tags are still processed.
    pub fn rename_across_tags(
        &self,
        old: &CitationKey,
        new: &CitationKey,
    ) -> Result<RenameReport> {
        let mut relinks = Vec::new();
        for tag in self.tags_on(old)? {
            self.remove_tag(old, &tag)?;
            let outcome = match self.apply_tag(new, &tag) {
                Ok(_) => RelinkOutcome::Relinked,
                Err(e) => {
                    tracing::warn!("Could not tag '{}' with '{}': {}", new, tag, e);
                    RelinkOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            relinks.push(TagRelink { tag, outcome });
        }

        Ok(RenameReport {
            old: old.clone(),
            new: new.clone(),
            relinks,
        })
    }

    /// Delete every broken link in the tree and prune what that empties.
    ///
    /// Returns the links deleted.
    pub fn remove_broken_links(&self) -> Result<Vec<PathBuf>> {
        let (_, issues) = self.tags.scan()?;
        let mut removed = Vec::new();
        for issue in issues {
            if let Inconsistency::BrokenLink { link, tag, .. } = issue {
                fs::remove_file(&link).at(&link)?;
                tracing::info!("Removed broken link {:?}", link);
                self.prune(&tag)?;
                removed.push(link);
            }
        }
        Ok(removed)
    }

    /// Tags of `key` from a fresh scan, counting broken links.
    fn tags_on(&self, key: &CitationKey) -> Result<BTreeSet<Tag>> {
        let (index, issues) = self.tags.scan()?;
        let mut tags = index.tags_of(key);
        for issue in issues {
            if let Inconsistency::BrokenLink { key: k, tag, .. } = issue {
                if &k == key {
                    tags.insert(tag);
                }
            }
        }
        Ok(tags)
    }

    /// Remove `tag`'s directory and then its ancestors while they are empty.
    /// The tag root itself is never a tag directory, so it stays.
    fn prune(&self, tag: &Tag) -> Result<()> {
        for level in std::iter::once(tag.clone()).chain(tag.ancestors()) {
            let dir = self.tags.tag_path(&level);
            match fs::read_dir(&dir) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).at(&dir),
            }
            fs::remove_dir(&dir).at(&dir)?;
            tracing::debug!("Pruned empty tag directory {:?}", dir);
        }
        Ok(())
    }
}

/// What happened to one tag during a rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RelinkOutcome {
    Relinked,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRelink {
    pub tag: Tag,
    pub outcome: RelinkOutcome,
}

/// Per-tag result of [`TagMutator::rename_across_tags`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameReport {
    pub old: CitationKey,
    pub new: CitationKey,
    pub relinks: Vec<TagRelink>,
}

impl RenameReport {
    /// Tags that could not be applied to the new key.
    pub fn failed(&self) -> Vec<Tag> {
        self.relinks
            .iter()
            .filter(|r| matches!(r.outcome, RelinkOutcome::Failed { .. }))
            .map(|r| r.tag.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed().is_empty()
    }

    /// Tags now on the new key.
    pub fn relinked(&self) -> BTreeSet<Tag> {
        self.relinks
            .iter()
            .filter(|r| r.outcome == RelinkOutcome::Relinked)
            .map(|r| r.tag.clone())
            .collect()
    }

    /// [`CkError::PartialRenameFailure`] if any tag failed.
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(CkError::PartialRenameFailure {
                old: self.old,
                new: self.new,
                failed,
            })
        }
    }
}
