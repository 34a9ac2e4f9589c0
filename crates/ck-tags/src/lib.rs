//! ck-tags: hierarchical tags and the key/tag relation.
//!
//! Tags are slash-separated paths like `queue/to-read`. A [`TagIndex`] is an
//! immutable snapshot of which citation keys carry which tags. It is built
//! from a list of [`TagLink`]s, so it can be constructed from a directory
//! scan or by hand in a test without touching a filesystem.

pub mod error;
pub mod hierarchy;
pub mod index;
pub mod key;
pub mod tag;

pub use error::TagError;
pub use hierarchy::TagHierarchy;
pub use index::{TagIndex, TagLink};
pub use key::CitationKey;
pub use tag::Tag;
