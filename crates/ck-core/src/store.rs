//! The flat paper store.
//!
//! Every paper is a set of files sharing one stem:
//!
//! | File | Kind |
//! |------|------|
//! | `<CK>.pdf` | [`FileKind::Pdf`] |
//! | `<CK>.bib` | [`FileKind::Bib`] |
//! | `<CK>.md` | [`FileKind::Notes`] |
//! | `<CK>.html` | [`FileKind::Html`] |
//! | `<CK>.slides.pdf` | [`FileKind::Slides`] |
//!
//! Only the document and the metadata file make a key exist; the rest are
//! companions that move along on rename.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use ck_bibtex::BibRecord;
use ck_tags::CitationKey;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{CkError, IoResultExt, Result};

/// The files a key may own in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Bib,
    Notes,
    Html,
    Slides,
}

impl FileKind {
    pub const ALL: [FileKind; 5] = [
        FileKind::Pdf,
        FileKind::Bib,
        FileKind::Notes,
        FileKind::Html,
        FileKind::Slides,
    ];

    /// Kinds that make a key exist and that tags link to.
    pub const LINKABLE: [FileKind; 2] = [FileKind::Pdf, FileKind::Bib];

    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Bib => "bib",
            FileKind::Notes => "md",
            FileKind::Html => "html",
            FileKind::Slides => "slides.pdf",
        }
    }
}

/// Split `<CK>.pdf` / `<CK>.bib` into key and extension as written.
///
/// The extension matches case-insensitively. Variants (`CMT12.slides.pdf`)
/// and stems that are not valid keys yield `None`.
pub(crate) fn parse_file_name(name: &str) -> Option<(CitationKey, &str)> {
    let (stem, ext) = name.rsplit_once('.')?;
    if !(ext.eq_ignore_ascii_case("pdf") || ext.eq_ignore_ascii_case("bib")) {
        return None;
    }
    if stem.contains('.') {
        return None;
    }
    CitationKey::new(stem).ok().map(|key| (key, ext))
}

/// Directory of paper files
#[derive(Debug, Clone)]
pub struct LibraryStore {
    root: PathBuf,
}

impl LibraryStore {
    /// Open an existing store directory.
    ///
    /// The root is canonicalized so that tag links get absolute targets.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = fs::canonicalize(root).at(root)?;
        if !root.is_dir() {
            return Err(CkError::NotADirectory(root));
        }
        tracing::debug!("Opened store at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a file of `kind` for `key` lives, whether or not it exists.
    pub fn path_for(&self, key: &CitationKey, kind: FileKind) -> PathBuf {
        self.root.join(key.file_name(kind.extension()))
    }

    /// A key exists if it has a document or a metadata file.
    pub fn exists(&self, key: &CitationKey) -> bool {
        !self.linkable_kinds(key).is_empty()
    }

    /// Every kind of file present for `key`.
    pub fn existing_kinds(&self, key: &CitationKey) -> Vec<FileKind> {
        FileKind::ALL
            .into_iter()
            .filter(|kind| self.path_for(key, *kind).exists())
            .collect()
    }

    /// The document and metadata files present for `key`.
    pub fn linkable_kinds(&self, key: &CitationKey) -> Vec<FileKind> {
        FileKind::LINKABLE
            .into_iter()
            .filter(|kind| self.path_for(key, *kind).exists())
            .collect()
    }

    /// Keys of all papers in the store.
    ///
    /// With `recursive`, subdirectories are searched too. Symlinked
    /// directories are never followed.
    pub fn list_keys(&self, recursive: bool) -> Result<BTreeSet<CitationKey>> {
        Ok(self
            .paper_files(recursive)?
            .into_iter()
            .map(|(_, key, _)| key)
            .collect())
    }

    /// Papers whose file extension is not lower case (`UP1.PDF`).
    ///
    /// These are listed as keys but cannot be tagged, since links always
    /// point at the lower-case name.
    pub fn non_lowercase_files(&self, recursive: bool) -> Result<Vec<PathBuf>> {
        Ok(self
            .paper_files(recursive)?
            .into_iter()
            .filter(|(_, _, ext)| ext.bytes().any(|b| b.is_ascii_uppercase()))
            .map(|(path, _, _)| path)
            .collect())
    }

    /// Every `<CK>.pdf` / `<CK>.bib` file with its key and extension as
    /// written, in name order.
    fn paper_files(&self, recursive: bool) -> Result<Vec<(PathBuf, CitationKey, String)>> {
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                tracing::debug!("Skipping non-UTF-8 file name {:?}", entry.path());
                continue;
            };
            if let Some((key, ext)) = parse_file_name(name) {
                files.push((entry.path().to_path_buf(), key, ext.to_string()));
            }
        }

        Ok(files)
    }

    /// Every `<key>.*` file directly in the store, variants included.
    pub fn files_of(&self, key: &CitationKey) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root).at(&self.root)? {
            let entry = entry.at(&self.root)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let owned = name
                .strip_prefix(key.as_str())
                .is_some_and(|rest| rest.starts_with('.'));
            if owned {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse the metadata file of `key`.
    pub fn read_record(&self, key: &CitationKey) -> Result<BibRecord> {
        let path = self.path_for(key, FileKind::Bib);
        if !path.exists() {
            return Err(CkError::StoreEntryMissing {
                key: key.clone(),
                store: self.root.clone(),
            });
        }
        let bytes = fs::read(&path).at(&path)?;
        ck_bibtex::parse(&bytes).map_err(|source| CkError::Parse { path, source })
    }

    /// Write the metadata file of `key`, setting the record's identifier to
    /// `key`.
    ///
    /// The text goes to a temporary file first and is renamed into place.
    pub fn write_record(&self, key: &CitationKey, record: &BibRecord) -> Result<()> {
        let mut record = record.clone();
        record.cite_key = key.to_string();

        let path = self.path_for(key, FileKind::Bib);
        let tmp = self.root.join(format!(".{}.tmp", key.file_name("bib")));
        fs::write(&tmp, ck_bibtex::serialize(&record)).at(&tmp)?;
        fs::rename(&tmp, &path).at(&path)?;
        tracing::debug!("Wrote {:?}", path);
        Ok(())
    }

    /// Move every `<old>.*` file to `<new>.*`.
    ///
    /// Fails with [`CkError::KeyCollision`] before touching anything if one
    /// of the destinations exists. Returns the `(from, to)` pairs moved.
    pub fn rename_files(
        &self,
        old: &CitationKey,
        new: &CitationKey,
    ) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut moves = Vec::new();
        for from in self.files_of(old)? {
            let Some(name) = from.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let suffix = &name[old.as_str().len()..];
            let to = self.root.join(format!("{}{}", new, suffix));
            if to.exists() {
                return Err(CkError::KeyCollision { key: new.clone() });
            }
            moves.push((from, to));
        }

        for (from, to) in &moves {
            fs::rename(from, to).at(from)?;
            tracing::debug!("Moved {:?} to {:?}", from, to);
        }
        Ok(moves)
    }

    /// One listing row for `key`, read from its metadata file.
    ///
    /// An identifier that disagrees with the file name is logged, not fixed.
    pub fn summary(&self, key: &CitationKey) -> Result<EntrySummary> {
        let record = self.read_record(key)?;
        if record.cite_key != key.as_str() {
            tracing::warn!(
                "Expected '{}' as the key in {}.bib (got '{}')",
                key,
                key,
                record.cite_key
            );
        }
        Ok(EntrySummary::from_record(key.clone(), &record))
    }
}

/// Plain-text facts about one paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub key: CitationKey,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub authors: Option<String>,
    pub date_added: Option<NaiveDateTime>,
    pub venue: Option<String>,
    pub url: Option<String>,
}

impl EntrySummary {
    pub fn from_record(key: CitationKey, record: &BibRecord) -> Self {
        Self {
            key,
            title: record.title(),
            year: record.year(),
            authors: record.author_line(),
            date_added: record.date_added(),
            venue: record.venue(),
            url: record.url(),
        }
    }
}

impl fmt::Display for EntrySummary {
    /// `CK, title, year, authors, (Month d, yyyy), venue`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.key, self.title.as_deref().unwrap_or(""))?;
        match self.year {
            Some(year) => write!(f, ", {}", year)?,
            None => f.write_str(", ")?,
        }
        write!(f, ", {}", self.authors.as_deref().unwrap_or(""))?;
        if let Some(date) = self.date_added {
            write!(f, ", ({})", date.format("%B %-d, %Y"))?;
        }
        if let Some(venue) = &self.venue {
            write!(f, ", {}", venue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ck_bibtex::EntryType;
    use rstest::rstest;
    use tempfile::TempDir;

    fn ck(s: &str) -> CitationKey {
        CitationKey::new(s).unwrap()
    }

    fn store_with(files: &[&str]) -> (TempDir, LibraryStore) {
        let dir = TempDir::new().unwrap();
        for name in files {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let store = LibraryStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[rstest]
    #[case("TD17.pdf", Some(("TD17", "pdf")))]
    #[case("TD17.BIB", Some(("TD17", "BIB")))]
    #[case("CMT12.slides.pdf", None)]
    #[case("notes.md", None)]
    #[case(".pdf", None)]
    #[case("README", None)]
    fn file_names(#[case] name: &str, #[case] expected: Option<(&str, &str)>) {
        let parsed = parse_file_name(name);
        assert_eq!(
            parsed.as_ref().map(|(k, e)| (k.as_str(), *e)),
            expected
        );
    }

    #[test]
    fn open_requires_a_directory() {
        let (dir, _) = store_with(&["file.txt"]);
        assert!(matches!(
            LibraryStore::open(dir.path().join("file.txt")),
            Err(CkError::NotADirectory(_))
        ));
        assert!(matches!(
            LibraryStore::open(dir.path().join("missing")),
            Err(CkError::Io { .. })
        ));
    }

    #[test]
    fn list_keys_dedups_and_skips_variants() {
        let (dir, store) = store_with(&[
            "TD17.pdf",
            "TD17.bib",
            "CMT12.PDF",
            "CMT12.slides.pdf",
            "BibOnly.bib",
            "notes.txt",
        ]);
        fs::create_dir(dir.path().join("old")).unwrap();
        fs::write(dir.path().join("old").join("Nested1.pdf"), b"x").unwrap();

        let flat: Vec<_> = store.list_keys(false).unwrap().into_iter().collect();
        assert_eq!(flat, vec![ck("BibOnly"), ck("CMT12"), ck("TD17")]);

        let deep = store.list_keys(true).unwrap();
        assert!(deep.contains(&ck("Nested1")));
        assert_eq!(deep.len(), 4);
    }

    #[test]
    fn non_lowercase_files_are_found() {
        let (_dir, store) = store_with(&["UP1.PDF", "UP1.md", "TD17.pdf", "Mixed2.Bib"]);
        let found: Vec<_> = store
            .non_lowercase_files(false)
            .unwrap()
            .into_iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(found, vec!["Mixed2.Bib", "UP1.PDF"]);
    }

    #[test]
    fn exists_needs_document_or_metadata() {
        let (_dir, store) = store_with(&["A1.bib", "B2.md", "C3.pdf"]);
        assert!(store.exists(&ck("A1")));
        assert!(!store.exists(&ck("B2")));
        assert!(store.exists(&ck("C3")));
        assert_eq!(store.existing_kinds(&ck("B2")), vec![FileKind::Notes]);
    }

    #[test]
    fn files_of_matches_whole_stem() {
        let (_dir, store) = store_with(&["TD17.pdf", "TD17.slides.pdf", "TD17b.pdf", "TD17.md"]);
        let files = store.files_of(&ck("TD17")).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(store.root()).unwrap().to_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("TD17.md"),
                PathBuf::from("TD17.pdf"),
                PathBuf::from("TD17.slides.pdf"),
            ]
        );
    }

    #[test]
    fn rename_files_moves_companions() {
        let (_dir, store) = store_with(&["OLD1.pdf", "OLD1.bib", "OLD1.slides.pdf"]);
        let moved = store.rename_files(&ck("OLD1"), &ck("NEW1")).unwrap();
        assert_eq!(moved.len(), 3);
        assert!(store.path_for(&ck("NEW1"), FileKind::Slides).exists());
        assert!(store.files_of(&ck("OLD1")).unwrap().is_empty());
    }

    #[test]
    fn rename_files_refuses_to_overwrite() {
        let (_dir, store) = store_with(&["OLD1.pdf", "OLD1.bib", "NEW1.bib"]);
        let err = store.rename_files(&ck("OLD1"), &ck("NEW1")).unwrap_err();
        assert!(matches!(err, CkError::KeyCollision { .. }));
        assert!(store.path_for(&ck("OLD1"), FileKind::Pdf).exists());
    }

    #[test]
    fn records_round_trip_with_forced_key() {
        let (_dir, store) = store_with(&[]);
        let mut record = BibRecord::new(EntryType::Article, "something-else");
        record.set("title", "Catena");
        record.set("year", "2017");
        store.write_record(&ck("TD17"), &record).unwrap();

        let back = store.read_record(&ck("TD17")).unwrap();
        assert_eq!(back.cite_key, "TD17");
        assert_eq!(back.get("title"), Some("Catena"));
        assert_eq!(store.list_keys(false).unwrap().len(), 1);
    }

    #[test]
    fn read_record_reports_missing_and_malformed() {
        let (dir, store) = store_with(&[]);
        assert!(matches!(
            store.read_record(&ck("Nope")),
            Err(CkError::StoreEntryMissing { .. })
        ));
        fs::write(dir.path().join("Bad1.bib"), "@article{Bad1, title = {open").unwrap();
        assert!(matches!(
            store.read_record(&ck("Bad1")),
            Err(CkError::Parse { .. })
        ));
    }

    #[test]
    fn summary_row() {
        let (_dir, store) = store_with(&[]);
        let mut record = BibRecord::new(EntryType::InProceedings, "TD17");
        record.set("author", "Tomescu, Alin and\n  Devadas, Srinivas");
        record.set("title", "{Catena}: Efficient Non-equivocation via {Bitcoin}");
        record.set("year", "2017");
        record.set("booktitle", "IEEE S&P");
        record.set_date_added(
            NaiveDateTime::parse_from_str("2018-03-04 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        );
        store.write_record(&ck("TD17"), &record).unwrap();

        let summary = store.summary(&ck("TD17")).unwrap();
        assert_eq!(
            summary.to_string(),
            "TD17, Catena: Efficient Non-equivocation via Bitcoin, 2017, \
             Tomescu, Alin and Devadas, Srinivas, (March 4, 2018), IEEE S&P"
        );
    }
}
