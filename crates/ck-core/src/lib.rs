//! ck-core: a paper library kept as plain files.
//!
//! Papers live in a flat store directory as `<CK>.pdf` / `<CK>.bib` pairs,
//! named by a citation key (CK). Tags are a separate directory tree of
//! symlinks pointing back into the store:
//!
//! ```text
//! bib/                      tags/
//! ├── TD17.pdf              ├── blockchain/
//! ├── TD17.bib              │   ├── TD17.pdf -> bib/TD17.pdf
//! └── TD17.slides.pdf       │   └── TD17.bib -> bib/TD17.bib
//!                           └── queue/
//!                               └── to-read/ ...
//! ```
//!
//! - [`store`]: the flat store of paper files
//! - [`citekey`]: deriving keys from bibliographic records
//! - [`tagdir`]: scanning and mutating the symlink tree
//! - [`library`]: operations spanning both (add, rename, canonicalize)
//!
//! Nothing is cached between calls: every query scans the tag tree afresh
//! and the filesystem stays the only source of truth.

pub mod citekey;
pub mod config;
pub mod error;
pub mod library;
pub mod store;
pub mod tagdir;

pub use ck_bibtex::{BibRecord, EntryType, ParseError};
pub use ck_tags::{CitationKey, Tag, TagError, TagHierarchy, TagIndex, TagLink};

pub use citekey::KeyPolicy;
pub use config::CkConfig;
pub use error::{CkError, Result};
pub use library::{CanonicalizeOutcome, CanonicalizeReport, Library, LibraryIssue, Listing};
pub use store::{EntrySummary, FileKind, LibraryStore};
pub use tagdir::{Inconsistency, RelinkOutcome, RenameReport, TagDir, TagMutator};
