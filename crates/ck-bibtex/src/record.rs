//! BibTeX record data structures

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::names::{split_names, PersonName};

/// Field holding the date a paper was added to the library.
pub const DATE_ADDED_FIELD: &str = "ckdateadded";

/// `chrono` format of [`DATE_ADDED_FIELD`] values.
pub const DATE_ADDED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// BibTeX entry type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Article,
    Book,
    InCollection,
    InProceedings,
    MastersThesis,
    Misc,
    PhdThesis,
    TechReport,
    Unpublished,
    Online,
    /// Any other type, kept verbatim (lower-cased) so it survives a rewrite.
    Other(String),
}

impl EntryType {
    /// Parse an entry type name (case-insensitive).
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "article" => Self::Article,
            "book" => Self::Book,
            "incollection" => Self::InCollection,
            "inproceedings" | "conference" => Self::InProceedings,
            "mastersthesis" => Self::MastersThesis,
            "misc" => Self::Misc,
            "phdthesis" => Self::PhdThesis,
            "techreport" => Self::TechReport,
            "unpublished" => Self::Unpublished,
            "online" | "electronic" | "www" => Self::Online,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical name written after `@`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Article => "article",
            Self::Book => "book",
            Self::InCollection => "incollection",
            Self::InProceedings => "inproceedings",
            Self::MastersThesis => "mastersthesis",
            Self::Misc => "misc",
            Self::PhdThesis => "phdthesis",
            Self::TechReport => "techreport",
            Self::Unpublished => "unpublished",
            Self::Online => "online",
            Self::Other(name) => name,
        }
    }
}

/// A single `name = value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibField {
    pub name: String,
    pub value: String,
}

/// One bibliographic record: entry type, identifier and ordered fields.
///
/// Field names are matched case-insensitively; insertion order is kept so a
/// parse/serialize cycle does not shuffle the user's file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibRecord {
    pub entry_type: EntryType,
    pub cite_key: String,
    fields: Vec<BibField>,
}

impl BibRecord {
    pub fn new(entry_type: EntryType, cite_key: impl Into<String>) -> Self {
        Self {
            entry_type,
            cite_key: cite_key.into(),
            fields: Vec::new(),
        }
    }

    /// All fields in file order.
    pub fn fields(&self) -> &[BibField] {
        &self.fields
    }

    /// Raw value of a field (case-insensitive name).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// Set a field, replacing an existing value in place or appending.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            Some(field) => field.value = value,
            None => self.fields.push(BibField {
                name: name.to_ascii_lowercase(),
                value,
            }),
        }
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))?;
        Some(self.fields.remove(pos).value)
    }

    pub(crate) fn push_field(&mut self, name: &str, value: String) {
        self.fields.push(BibField {
            name: name.to_string(),
            value,
        });
    }

    /// Authors in order, parsed from the `author` field.
    pub fn authors(&self) -> Vec<PersonName> {
        self.get("author")
            .map(|field| split_names(field).into_iter().map(PersonName::parse).collect())
            .unwrap_or_default()
    }

    /// The `author` field with line breaks folded into spaces.
    pub fn author_line(&self) -> Option<String> {
        self.get("author").map(collapse_whitespace)
    }

    /// Publication year, if the `year` field starts with a 4-digit number.
    pub fn year(&self) -> Option<i32> {
        let digits: String = self
            .get("year")?
            .trim()
            .trim_matches(|c| c == '{' || c == '}')
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.len() == 4 {
            digits.parse().ok()
        } else {
            None
        }
    }

    /// Title with protective braces removed and whitespace collapsed.
    pub fn title(&self) -> Option<String> {
        self.get("title")
            .map(|t| collapse_whitespace(&t.replace(['{', '}'], "")))
            .filter(|t| !t.is_empty())
    }

    /// Value of [`DATE_ADDED_FIELD`], if present and well-formed.
    pub fn date_added(&self) -> Option<NaiveDateTime> {
        let raw = self.get(DATE_ADDED_FIELD)?;
        NaiveDateTime::parse_from_str(raw.trim(), DATE_ADDED_FORMAT).ok()
    }

    pub fn set_date_added(&mut self, when: NaiveDateTime) {
        self.set(DATE_ADDED_FIELD, when.format(DATE_ADDED_FORMAT).to_string());
    }

    /// Best link to the paper: `url`, then the DOI resolver, then arXiv.
    pub fn url(&self) -> Option<String> {
        if let Some(url) = self.get("url") {
            return Some(url.trim().to_string());
        }
        if let Some(doi) = self.get("doi") {
            return Some(format!("https://doi.org/{}", doi.trim()));
        }
        let archive = self.get("archiveprefix").or_else(|| self.get("eprinttype"));
        match (archive, self.get("eprint")) {
            (Some(a), Some(id)) if a.eq_ignore_ascii_case("arxiv") => {
                Some(format!("https://arxiv.org/abs/{}", id.trim()))
            }
            _ => None,
        }
    }

    /// Where the paper appeared: journal, proceedings, or eprint archive.
    pub fn venue(&self) -> Option<String> {
        ["journal", "booktitle", "howpublished", "publisher", "archiveprefix"]
            .iter()
            .find_map(|name| self.get(name))
            .map(|v| collapse_whitespace(&v.replace(['{', '}'], "")))
            .filter(|v| !v.is_empty())
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> BibRecord {
        let mut record = BibRecord::new(EntryType::Article, "TD17");
        record.push_field("Author", "Alin Tomescu and\n  Srinivas Devadas".to_string());
        record.push_field("title", "{Catena}: Efficient Non-equivocation via {Bitcoin}".to_string());
        record.push_field("year", "2017".to_string());
        record.push_field("doi", "10.1109/SP.2017.19".to_string());
        record
    }

    #[test]
    fn entry_type_names() {
        assert_eq!(EntryType::from_name("ARTICLE"), EntryType::Article);
        assert_eq!(EntryType::from_name("conference"), EntryType::InProceedings);
        assert_eq!(
            EntryType::from_name("patent"),
            EntryType::Other("patent".to_string())
        );
        assert_eq!(EntryType::Other("patent".to_string()).as_str(), "patent");
    }

    #[test]
    fn field_access_is_case_insensitive() {
        let record = sample();
        assert_eq!(record.get("AUTHOR"), record.get("author"));
        assert_eq!(record.year(), Some(2017));
        assert_eq!(
            record.title().as_deref(),
            Some("Catena: Efficient Non-equivocation via Bitcoin")
        );
        assert_eq!(
            record.author_line().as_deref(),
            Some("Alin Tomescu and Srinivas Devadas")
        );
    }

    #[test]
    fn set_replaces_in_place() {
        let mut record = sample();
        record.set("YEAR", "2018");
        assert_eq!(record.year(), Some(2018));
        assert_eq!(record.fields().len(), 4);

        record.set("note", "x");
        assert_eq!(record.fields().last().map(|f| f.name.as_str()), Some("note"));
        assert_eq!(record.remove("note").as_deref(), Some("x"));
    }

    #[test]
    fn year_requires_four_digits() {
        let mut record = sample();
        record.set("year", "17");
        assert_eq!(record.year(), None);
        record.set("year", "2019 (to appear)");
        assert_eq!(record.year(), Some(2019));
    }

    #[test]
    fn date_added_round_trip() {
        let mut record = sample();
        assert_eq!(record.date_added(), None);
        let when = NaiveDate::from_ymd_opt(2020, 3, 14)
            .unwrap()
            .and_hms_opt(15, 9, 26)
            .unwrap();
        record.set_date_added(when);
        assert_eq!(record.get(DATE_ADDED_FIELD), Some("2020-03-14 15:09:26"));
        assert_eq!(record.date_added(), Some(when));
    }

    #[test]
    fn url_prefers_explicit_then_doi_then_arxiv() {
        let mut record = sample();
        assert_eq!(
            record.url().as_deref(),
            Some("https://doi.org/10.1109/SP.2017.19")
        );
        record.set("url", "https://example.org/catena.pdf");
        assert_eq!(record.url().as_deref(), Some("https://example.org/catena.pdf"));

        let mut preprint = BibRecord::new(EntryType::Misc, "X20");
        preprint.set("archivePrefix", "arXiv");
        preprint.set("eprint", "2001.00001");
        assert_eq!(
            preprint.url().as_deref(),
            Some("https://arxiv.org/abs/2001.00001")
        );
        assert_eq!(preprint.venue().as_deref(), Some("arXiv"));
    }
}
