//! The key/tag relation.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::hierarchy::TagHierarchy;
use crate::key::CitationKey;
use crate::tag::Tag;

/// One application of a tag to a key (one tag directory entry).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TagLink {
    pub key: CitationKey,
    pub tag: Tag,
}

impl TagLink {
    pub fn new(key: CitationKey, tag: Tag) -> Self {
        Self { key, tag }
    }
}

/// Immutable snapshot of which keys carry which tags.
///
/// Both directions of the relation are built together from the same links,
/// so `by_key` and `by_tag` always describe the same set of pairs. Ordered
/// collections make two snapshots of the same links compare equal no matter
/// the order the links arrived in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagIndex {
    by_key: BTreeMap<CitationKey, BTreeSet<Tag>>,
    by_tag: BTreeMap<Tag, BTreeSet<CitationKey>>,
}

impl TagIndex {
    /// Build a snapshot from links. Duplicate links (a `.pdf` and a `.bib`
    /// link for the same key under the same tag) collapse into one pair.
    pub fn from_links(links: impl IntoIterator<Item = TagLink>) -> Self {
        let mut index = Self::default();
        for TagLink { key, tag } in links {
            index.by_tag.entry(tag.clone()).or_default().insert(key.clone());
            index.by_key.entry(key).or_default().insert(tag);
        }
        index
    }

    /// Tags applied to `key` (empty if the key is untagged).
    pub fn tags_of(&self, key: &CitationKey) -> BTreeSet<Tag> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    /// Keys carrying exactly `tag`.
    pub fn keys_with(&self, tag: &Tag) -> BTreeSet<CitationKey> {
        self.by_tag.get(tag).cloned().unwrap_or_default()
    }

    /// Keys carrying any of `tags`.
    ///
    /// With `recursive`, a key tagged only `queue/to-read` also matches a
    /// request for `queue`.
    pub fn keys_for_tags<'a>(
        &self,
        tags: impl IntoIterator<Item = &'a Tag>,
        recursive: bool,
    ) -> BTreeSet<CitationKey> {
        let mut keys = BTreeSet::new();
        for requested in tags {
            if recursive {
                for (_, tagged) in self.by_tag.iter().filter(|(t, _)| requested.covers(t)) {
                    keys.extend(tagged.iter().cloned());
                }
            } else if let Some(tagged) = self.by_tag.get(requested) {
                keys.extend(tagged.iter().cloned());
            }
        }
        keys
    }

    /// Keys from `all_keys` that carry no tag at all.
    pub fn untagged<'a>(
        &self,
        all_keys: impl IntoIterator<Item = &'a CitationKey>,
    ) -> BTreeSet<CitationKey> {
        all_keys
            .into_iter()
            .filter(|k| !self.by_key.contains_key(*k))
            .cloned()
            .collect()
    }

    /// Requested tags that neither exist nor have descendants in the index.
    pub fn unknown_tags<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>) -> Vec<Tag> {
        tags.into_iter()
            .filter(|t| !self.by_tag.keys().any(|known| t.covers(known)))
            .cloned()
            .collect()
    }

    /// Every tag with at least one key.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.by_tag.keys()
    }

    /// Every key with at least one tag.
    pub fn keys(&self) -> impl Iterator<Item = &CitationKey> {
        self.by_key.keys()
    }

    /// The pairs of the relation, ordered by key then tag.
    pub fn links(&self) -> impl Iterator<Item = TagLink> + '_ {
        self.by_key.iter().flat_map(|(key, tags)| {
            tags.iter()
                .map(move |tag| TagLink::new(key.clone(), tag.clone()))
        })
    }

    /// Tag tree including intermediate levels that carry no key directly.
    pub fn hierarchy(&self) -> TagHierarchy {
        TagHierarchy::from_tags(self.by_tag.iter().map(|(t, keys)| (t, keys.len())))
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Number of tagged keys.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }
}
