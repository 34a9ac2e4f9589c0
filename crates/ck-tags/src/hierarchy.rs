//! Tag tree for display.

use std::collections::{BTreeMap, BTreeSet};

use crate::tag::Tag;

/// A tag tree built from the tags present in an index.
///
/// Intermediate levels that carry no key directly (the `queue` directory
/// when only `queue/to-read` has links) are still nodes of the tree.
#[derive(Debug, Clone, Default)]
pub struct TagHierarchy {
    /// Tag → number of keys carrying exactly that tag.
    counts: BTreeMap<Tag, usize>,
    children: BTreeMap<Tag, BTreeSet<Tag>>,
    roots: BTreeSet<Tag>,
}

impl TagHierarchy {
    /// Build a hierarchy from `(tag, direct key count)` pairs.
    pub fn from_tags<'a>(tags: impl IntoIterator<Item = (&'a Tag, usize)>) -> Self {
        let mut h = Self::default();
        for (tag, count) in tags {
            *h.counts.entry(tag.clone()).or_default() += count;
            h.insert_chain(tag);
        }
        h
    }

    fn insert_chain(&mut self, tag: &Tag) {
        let mut current = tag.clone();
        loop {
            self.counts.entry(current.clone()).or_default();
            match current.parent() {
                Some(parent) => {
                    self.children
                        .entry(parent.clone())
                        .or_default()
                        .insert(current);
                    current = parent;
                }
                None => {
                    self.roots.insert(current);
                    return;
                }
            }
        }
    }

    /// Top-level tags.
    pub fn roots(&self) -> impl Iterator<Item = &Tag> {
        self.roots.iter()
    }

    /// Direct children of a tag.
    pub fn children_of(&self, tag: &Tag) -> impl Iterator<Item = &Tag> {
        self.children.get(tag).into_iter().flatten()
    }

    /// All descendants of a tag, depth-first.
    pub fn descendants_of(&self, tag: &Tag) -> Vec<&Tag> {
        let mut result = Vec::new();
        self.collect_descendants(tag, &mut result);
        result
    }

    fn collect_descendants<'a>(&'a self, tag: &Tag, result: &mut Vec<&'a Tag>) {
        for child in self.children_of(tag) {
            result.push(child);
            self.collect_descendants(child, result);
        }
    }

    /// Keys tagged exactly `tag`.
    pub fn direct_count(&self, tag: &Tag) -> usize {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// Total number of nodes, implicit levels included.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Format as an indented tree with per-node key counts.
    pub fn format_tree(&self) -> String {
        let mut output = String::new();
        for root in &self.roots {
            self.format_subtree(root, "", true, true, &mut output);
        }
        output
    }

    fn format_subtree(&self, tag: &Tag, prefix: &str, is_last: bool, is_root: bool, output: &mut String) {
        let connector = match (is_root, is_last) {
            (true, _) => "",
            (false, true) => "└── ",
            (false, false) => "├── ",
        };
        output.push_str(prefix);
        output.push_str(connector);
        output.push_str(tag.leaf());
        let count = self.direct_count(tag);
        if count > 0 {
            output.push_str(&format!(" ({})", count));
        }
        output.push('\n');

        let child_prefix = match (is_root, is_last) {
            (true, _) => String::new(),
            (false, true) => format!("{}    ", prefix),
            (false, false) => format!("{}│   ", prefix),
        };

        let children: Vec<&Tag> = self.children_of(tag).collect();
        for (i, child) in children.iter().enumerate() {
            self.format_subtree(child, &child_prefix, i + 1 == children.len(), false, output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> Tag {
        Tag::parse(s).unwrap()
    }

    fn sample() -> TagHierarchy {
        let tags = [
            (tag("queue/to-read"), 2),
            (tag("queue/finished"), 1),
            (tag("crypto/accumulators/merkle"), 1),
            (tag("crypto"), 3),
        ];
        TagHierarchy::from_tags(tags.iter().map(|(t, n)| (t, *n)))
    }

    #[test]
    fn implicit_levels_are_nodes() {
        let h = sample();
        assert_eq!(h.roots().collect::<Vec<_>>(), vec![&tag("crypto"), &tag("queue")]);
        assert_eq!(h.len(), 6);
        assert_eq!(h.direct_count(&tag("queue")), 0);
        assert_eq!(h.direct_count(&tag("crypto")), 3);
    }

    #[test]
    fn descendants_depth_first() {
        let h = sample();
        assert_eq!(
            h.descendants_of(&tag("crypto")),
            vec![&tag("crypto/accumulators"), &tag("crypto/accumulators/merkle")]
        );
        assert!(h.descendants_of(&tag("queue/finished")).is_empty());
    }

    #[test]
    fn format_tree() {
        let tree = sample().format_tree();
        assert_eq!(
            tree,
            "crypto (3)\n└── accumulators\n    └── merkle (1)\nqueue\n├── finished (1)\n└── to-read (2)\n"
        );
    }
}
