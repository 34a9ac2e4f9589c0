//! BibTeX records for citekeys metadata files.
//!
//! Every `<CK>.bib` file in a library holds exactly one entry. This crate
//! reads such a file into a [`BibRecord`], gives typed access to the fields
//! the rest of the workspace cares about (authors, year, title, the
//! `ckdateadded` stamp), and writes the record back out.
//!
//! Features:
//! - nom-based parser with `@string` macro expansion and `#` concatenation
//! - `@comment` / `@preamble` blocks are skipped
//! - BibTeX name-list splitting (`and`-separated, brace-aware)
//! - Stable writer output

mod names;
pub mod parser;
mod record;
mod writer;

pub use names::{split_names, PersonName};
pub use parser::{parse, parse_all, ParseError};
pub use record::{BibField, BibRecord, EntryType, DATE_ADDED_FIELD, DATE_ADDED_FORMAT};
pub use writer::serialize;
