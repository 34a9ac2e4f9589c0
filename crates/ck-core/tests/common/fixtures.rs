//! Throwaway libraries and fixture files

use std::fs;
use std::path::PathBuf;

use ck_core::{CitationKey, CkConfig, Library, Tag};
use tempfile::TempDir;

/// Get the path to a fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_fixtures")
        .join(name)
}

/// Load a BibTeX fixture as bytes
#[allow(dead_code)]
pub fn load_bibtex_fixture(name: &str) -> Vec<u8> {
    let path = fixture_path(&format!("bibtex/{}", name));
    fs::read(&path).unwrap_or_else(|_| panic!("Failed to load fixture: {}", name))
}

pub fn ck(s: &str) -> CitationKey {
    CitationKey::new(s).unwrap()
}

pub fn tag(s: &str) -> Tag {
    Tag::parse(s).unwrap()
}

/// A minimal metadata file whose identifier is `key`.
#[allow(dead_code)]
pub fn bib_text(key: &str, author: &str, year: &str, title: &str) -> String {
    format!(
        "@article{{{},\n  author = {{{}}},\n  title = {{{}}},\n  year = {{{}}}\n}}\n",
        key, author, title, year
    )
}

/// A library in a temporary directory: `<tmp>/bib` and `<tmp>/tags`.
///
/// The tag root is not created up front.
pub struct TestLibrary {
    pub tmp: TempDir,
    pub library: Library,
}

#[allow(dead_code)]
impl TestLibrary {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let bib_dir = tmp.path().join("bib");
        fs::create_dir(&bib_dir).unwrap();
        let config = CkConfig {
            bib_dir,
            tag_dir: tmp.path().join("tags"),
            ..CkConfig::default()
        };
        let library = Library::open(config).unwrap();
        Self { tmp, library }
    }

    pub fn bib_dir(&self) -> PathBuf {
        self.library.store().root().to_path_buf()
    }

    pub fn tag_dir(&self) -> PathBuf {
        self.library.tag_dir().root().to_path_buf()
    }

    /// Write `<key>.pdf` and a matching `<key>.bib`.
    pub fn paper(&self, key: &str) -> CitationKey {
        self.write(&format!("{key}.pdf"), "%PDF-1.4");
        self.write(
            &format!("{key}.bib"),
            &bib_text(key, "Doe, Jane", "2020", "A Paper"),
        );
        ck(key)
    }

    /// Write an arbitrary file into the store.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.bib_dir().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Names of the files directly in the store, sorted.
    pub fn store_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.bib_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
