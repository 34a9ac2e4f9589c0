//! Operations that span the store and the tag tree.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use ck_bibtex::BibRecord;
use ck_tags::{CitationKey, Tag, TagIndex};
use serde::Serialize;

use crate::citekey::{self, KeyPolicy};
use crate::config::CkConfig;
use crate::error::{CkError, IoResultExt, Result};
use crate::store::{FileKind, LibraryStore};
use crate::tagdir::{Inconsistency, RenameReport, TagDir, TagMutator};

/// A store and its tag tree, opened from a [`CkConfig`].
#[derive(Debug, Clone)]
pub struct Library {
    config: CkConfig,
    store: LibraryStore,
    tags: TagDir,
}

impl Library {
    /// Open the library described by `config`. The store must exist; the
    /// tag tree is created on first use.
    pub fn open(config: CkConfig) -> Result<Self> {
        let store = LibraryStore::open(&config.bib_dir)?;
        let tags = TagDir::new(&config.tag_dir);
        Ok(Self {
            config,
            store,
            tags,
        })
    }

    pub fn config(&self) -> &CkConfig {
        &self.config
    }

    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    pub fn tag_dir(&self) -> &TagDir {
        &self.tags
    }

    pub fn mutator(&self) -> TagMutator<'_> {
        TagMutator::new(&self.store, &self.tags)
    }

    /// Keys in the store, descending into subdirectories if configured.
    pub fn keys(&self) -> Result<BTreeSet<CitationKey>> {
        self.store.list_keys(self.config.recursive_list)
    }

    pub fn index(&self) -> Result<TagIndex> {
        self.tags.index()
    }

    /// Add a new paper under `key`.
    ///
    /// The record's identifier is set to `key` and it is stamped with the
    /// current local time.
    pub fn add(
        &self,
        key: &CitationKey,
        record: &BibRecord,
        document: Option<&[u8]>,
    ) -> Result<()> {
        self.add_at(key, record, document, Local::now().naive_local())
    }

    /// [`Library::add`] with an explicit date-added stamp.
    pub fn add_at(
        &self,
        key: &CitationKey,
        record: &BibRecord,
        document: Option<&[u8]>,
        added: NaiveDateTime,
    ) -> Result<()> {
        if self.store.exists(key) {
            return Err(CkError::KeyCollision { key: key.clone() });
        }

        let mut record = record.clone();
        record.set_date_added(added);
        self.store.write_record(key, &record)?;

        if let Some(bytes) = document {
            let path = self.store.path_for(key, FileKind::Pdf);
            fs::write(&path, bytes).at(&path)?;
        }

        tracing::info!("Added '{}'", key);
        Ok(())
    }

    /// Derive a key for `record`, refusing keys already in the store.
    pub fn derive_key(&self, record: &BibRecord, policy: KeyPolicy) -> Result<CitationKey> {
        citekey::derive(record, policy, &self.keys()?)
    }

    /// Rename a paper: its files, the identifier in its metadata, and its
    /// tag links.
    ///
    /// The metadata is parsed before anything moves, so a malformed file
    /// aborts the rename with nothing changed. Tag failures are in the
    /// returned report; see [`RenameReport::into_result`].
    pub fn rename(&self, old: &CitationKey, new: &CitationKey) -> Result<RenameReport> {
        if !self.store.exists(old) {
            return Err(CkError::StoreEntryMissing {
                key: old.clone(),
                store: self.store.root().to_path_buf(),
            });
        }
        if self.store.exists(new) {
            return Err(CkError::KeyCollision { key: new.clone() });
        }

        let record = if self.store.path_for(old, FileKind::Bib).exists() {
            Some(self.store.read_record(old)?)
        } else {
            None
        };

        self.store.rename_files(old, new)?;
        if let Some(record) = record {
            self.store.write_record(new, &record)?;
        }
        tracing::info!("Renamed '{}' to '{}'", old, new);

        self.mutator().rename_across_tags(old, new)
    }

    /// Make the identifier in `key`'s metadata equal `key`.
    ///
    /// Returns whether the file was rewritten.
    pub fn canonicalize(&self, key: &CitationKey) -> Result<bool> {
        let record = self.store.read_record(key)?;
        if record.cite_key == key.as_str() {
            return Ok(false);
        }
        tracing::warn!(
            "Rewriting key '{}' to '{}' in {}.bib",
            record.cite_key,
            key,
            key
        );
        self.store.write_record(key, &record)?;
        Ok(true)
    }

    /// [`Library::canonicalize`] over every key with a metadata file.
    ///
    /// A key that fails is recorded and the batch moves on.
    pub fn canonicalize_all(&self) -> Result<CanonicalizeReport> {
        let mut entries = Vec::new();
        for key in self.keys()? {
            if !self.store.path_for(&key, FileKind::Bib).exists() {
                continue;
            }
            let outcome = match self.canonicalize(&key) {
                Ok(true) => CanonicalizeOutcome::Rewritten,
                Ok(false) => CanonicalizeOutcome::Unchanged,
                Err(e) => {
                    tracing::warn!("Skipping '{}': {}", key, e);
                    CanonicalizeOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            entries.push(CanonicalizeEntry { key, outcome });
        }
        Ok(CanonicalizeReport { entries })
    }

    /// Everything that looks wrong, in the tag tree and in the store.
    pub fn check(&self) -> Result<Vec<LibraryIssue>> {
        let (_, inconsistencies) = self.tags.scan()?;
        let mut issues: Vec<LibraryIssue> =
            inconsistencies.into_iter().map(LibraryIssue::TagTree).collect();
        issues.extend(
            self.store
                .non_lowercase_files(self.config.recursive_list)?
                .into_iter()
                .map(|path| LibraryIssue::NonLowercaseStoreFile { path }),
        );

        for key in self.keys()? {
            if !self.store.path_for(&key, FileKind::Bib).exists() {
                continue;
            }
            match self.store.read_record(&key) {
                Ok(record) if record.cite_key != key.as_str() => {
                    issues.push(LibraryIssue::KeyMismatch {
                        key,
                        found: record.cite_key,
                    })
                }
                Ok(_) => {}
                Err(e) => issues.push(LibraryIssue::UnreadableRecord {
                    key,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(issues)
    }

    /// Keys carrying any of `tags`, or every key in the store if `tags` is
    /// empty.
    pub fn list(&self, tags: &[Tag], recursive: bool) -> Result<Listing> {
        if tags.is_empty() {
            return Ok(Listing {
                keys: self.keys()?,
                unknown_tags: Vec::new(),
            });
        }

        let index = self.index()?;
        let unknown_tags = index.unknown_tags(tags);
        for tag in &unknown_tags {
            tracing::warn!("'{}' does not exist as a tag", tag);
        }
        Ok(Listing {
            keys: index.keys_for_tags(tags, recursive),
            unknown_tags,
        })
    }

    /// Keys in the store with no tag at all.
    pub fn untagged(&self) -> Result<BTreeSet<CitationKey>> {
        let keys = self.keys()?;
        Ok(self.index()?.untagged(&keys))
    }

    /// Delete broken tag links and the directories they leave empty.
    pub fn cleanup(&self) -> Result<Vec<PathBuf>> {
        self.mutator().remove_broken_links()
    }
}

/// Result of [`Library::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub keys: BTreeSet<CitationKey>,
    /// Requested tags with no directory in the tree.
    pub unknown_tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CanonicalizeOutcome {
    Unchanged,
    Rewritten,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalizeEntry {
    pub key: CitationKey,
    pub outcome: CanonicalizeOutcome,
}

/// Per-key results of [`Library::canonicalize_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalizeReport {
    pub entries: Vec<CanonicalizeEntry>,
}

impl CanonicalizeReport {
    pub fn rewritten(&self) -> Vec<&CitationKey> {
        self.with(|o| matches!(o, CanonicalizeOutcome::Rewritten))
    }

    pub fn failed(&self) -> Vec<&CitationKey> {
        self.with(|o| matches!(o, CanonicalizeOutcome::Failed { .. }))
    }

    fn with(&self, pred: impl Fn(&CanonicalizeOutcome) -> bool) -> Vec<&CitationKey> {
        self.entries
            .iter()
            .filter(|e| pred(&e.outcome))
            .map(|e| &e.key)
            .collect()
    }
}

/// A finding of [`Library::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryIssue {
    TagTree(Inconsistency),
    /// The metadata names a different key than its file.
    KeyMismatch { key: CitationKey, found: String },
    UnreadableRecord { key: CitationKey, reason: String },
    /// `UP1.PDF` in the store: listed, but tags cannot link to it.
    NonLowercaseStoreFile { path: PathBuf },
}

impl fmt::Display for LibraryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagTree(issue) => write!(f, "{}", issue),
            Self::KeyMismatch { key, found } => {
                write!(f, "{}.bib has key '{}'", key, found)
            }
            Self::UnreadableRecord { key, reason } => write!(f, "{}.bib: {}", key, reason),
            Self::NonLowercaseStoreFile { path } => {
                write!(f, "non-lowercase extension in store: {}", path.display())
            }
        }
    }
}
