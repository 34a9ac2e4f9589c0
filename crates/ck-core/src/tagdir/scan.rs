//! Reading the tag tree into a [`TagIndex`].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ck_tags::{CitationKey, Tag, TagIndex, TagLink};
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::{CkError, IoResultExt, Result};
use crate::store::parse_file_name;

/// Something in the tag tree that does not look like a healthy tag link.
///
/// Scans report these and never repair them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
    /// The link's target is gone. Not indexed.
    BrokenLink {
        link: PathBuf,
        key: CitationKey,
        tag: Tag,
    },
    /// `X.PDF` instead of `X.pdf`. Still indexed.
    NonLowercaseExtension { link: PathBuf },
    /// The link name and its target's name disagree on the key.
    MisnamedLink {
        link: PathBuf,
        key: CitationKey,
        target: PathBuf,
    },
    /// A link directly in the tag root carries no tag. Not indexed.
    LinkAtRoot { link: PathBuf },
    /// A link whose directory name is not a tag as written (`#todo`,
    /// ` x `). Not indexed.
    InvalidTagDirectory { link: PathBuf, reason: String },
    /// Anything that is neither a directory nor a key link.
    StrayFile { path: PathBuf },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrokenLink { link, key, tag } => write!(
                f,
                "broken link {} ('{}' tagged '{}' has no target)",
                link.display(),
                key,
                tag
            ),
            Self::NonLowercaseExtension { link } => {
                write!(f, "non-lowercase extension: {}", link.display())
            }
            Self::MisnamedLink { link, key, target } => write!(
                f,
                "link {} for '{}' points at {}",
                link.display(),
                key,
                target.display()
            ),
            Self::LinkAtRoot { link } => {
                write!(f, "link outside any tag: {}", link.display())
            }
            Self::InvalidTagDirectory { link, reason } => {
                write!(f, "link in a non-tag directory: {} ({})", link.display(), reason)
            }
            Self::StrayFile { path } => write!(f, "not a tag link: {}", path.display()),
        }
    }
}

/// Walk `tag_root` and collect every tag link.
///
/// Links are never followed; directories are visited in name order so the
/// inconsistency list comes out the same for the same tree. A missing root
/// is an empty tree.
pub fn scan(tag_root: &Path) -> Result<(TagIndex, Vec<Inconsistency>)> {
    match fs::metadata(tag_root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(CkError::NotADirectory(tag_root.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Tag root {:?} does not exist yet", tag_root);
            return Ok((TagIndex::default(), Vec::new()));
        }
        Err(e) => return Err(e).at(tag_root),
    }

    let mut links = Vec::new();
    let mut issues = Vec::new();

    let walker = WalkDir::new(tag_root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        if !file_type.is_symlink() {
            issues.push(Inconsistency::StrayFile {
                path: path.to_path_buf(),
            });
            continue;
        }

        let parsed = entry.file_name().to_str().and_then(parse_file_name);
        let Some((key, ext)) = parsed else {
            issues.push(Inconsistency::StrayFile {
                path: path.to_path_buf(),
            });
            continue;
        };

        let relative = path
            .parent()
            .and_then(|p| p.strip_prefix(tag_root).ok())
            .unwrap_or_else(|| Path::new(""));
        if relative.as_os_str().is_empty() {
            issues.push(Inconsistency::LinkAtRoot {
                link: path.to_path_buf(),
            });
            continue;
        }
        let tag = match Tag::from_relative_path(relative) {
            Ok(tag) => tag,
            Err(e) => {
                tracing::debug!("Skipping {:?}: {}", path, e);
                issues.push(Inconsistency::InvalidTagDirectory {
                    link: path.to_path_buf(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        // metadata() follows the link
        if fs::metadata(path).is_err() {
            issues.push(Inconsistency::BrokenLink {
                link: path.to_path_buf(),
                key,
                tag,
            });
            continue;
        }

        if ext.bytes().any(|b| b.is_ascii_uppercase()) {
            issues.push(Inconsistency::NonLowercaseExtension {
                link: path.to_path_buf(),
            });
        }

        let target = fs::read_link(path).at(path)?;
        let target_key = target
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_file_name)
            .map(|(k, _)| k);
        if target_key.as_ref() != Some(&key) {
            issues.push(Inconsistency::MisnamedLink {
                link: path.to_path_buf(),
                key: key.clone(),
                target,
            });
        }

        links.push(TagLink::new(key, tag));
    }

    tracing::debug!(
        "Scanned {:?}: {} links, {} inconsistencies",
        tag_root,
        links.len(),
        issues.len()
    );
    Ok((TagIndex::from_links(links), issues))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
