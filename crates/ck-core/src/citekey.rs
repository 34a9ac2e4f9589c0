//! Citation key derivation.
//!
//! Turns a [`BibRecord`] into a short key under one of several
//! [`KeyPolicy`] choices:
//!
//! | Policy | Authors `Tomescu`, `Devadas`; 2017; "Catena: ..." |
//! |--------|---------------------------------------------------|
//! | `KeepOriginal` | the record's own key |
//! | `FirstAuthorYearTitle` | `tomescu17catena` |
//! | `InitialsShortYear` | `TD17` |
//! | `InitialsFullYear` | `TD2017` |
//!
//! A candidate that is already in use is a [`CkError::KeyCollision`]. No
//! suffix is ever appended; picking a replacement is the caller's job.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use ck_bibtex::BibRecord;
use ck_tags::CitationKey;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::{CkError, Result};

/// Author token used when a record has no authors.
pub const NO_AUTHOR: &str = "Anon";

/// At most this many authors contribute an initial; more are abbreviated.
const MAX_INITIALS: usize = 4;

lazy_static! {
    /// Words skipped when picking the title word of a key
    static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "an", "the", "of", "in", "on", "at", "to", "for", "and", "or", "but", "with",
        "by", "from", "as", "is", "are", "was", "were", "be", "been", "being", "have", "has",
        "had", "do", "does", "did", "will", "would", "could", "should", "may", "might", "can",
        "this", "that", "how", "why", "what", "towards", "toward", "via", "new",
    ]
    .into_iter()
    .collect();
}

/// How keys for new papers are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum KeyPolicy {
    /// Use the key already present in the record.
    KeepOriginal,
    /// `<surname><yy><title word>`, lower-cased.
    FirstAuthorYearTitle,
    /// Author initials and a 2-digit year.
    #[default]
    InitialsShortYear,
    /// Author initials and a 4-digit year.
    InitialsFullYear,
}

impl fmt::Display for KeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KeepOriginal => "keep-original",
            Self::FirstAuthorYearTitle => "first-author-year-title",
            Self::InitialsShortYear => "initials-short-year",
            Self::InitialsFullYear => "initials-full-year",
        })
    }
}

/// Derive a key and check it against the keys already in use.
pub fn derive(
    record: &BibRecord,
    policy: KeyPolicy,
    in_use: &BTreeSet<CitationKey>,
) -> Result<CitationKey> {
    let key = candidate(record, policy)?;
    if in_use.contains(&key) {
        tracing::debug!("Derived key {} collides with an existing paper", key);
        return Err(CkError::KeyCollision { key });
    }
    Ok(key)
}

/// The key `policy` produces for `record`, without a collision check.
pub fn candidate(record: &BibRecord, policy: KeyPolicy) -> Result<CitationKey> {
    let raw = match policy {
        KeyPolicy::KeepOriginal => {
            let key = record.cite_key.trim();
            if key.is_empty() {
                return Err(CkError::IncompleteRecord { field: "key" });
            }
            key.to_string()
        }
        KeyPolicy::FirstAuthorYearTitle => {
            let surnames = surnames(record);
            let author = match surnames.as_slice() {
                [] => NO_AUTHOR.to_string(),
                [solo] => solo.chars().take(4).collect(),
                [first, ..] => first.clone(),
            };
            let year = short_year(year_of(record)?);
            let title = record
                .title()
                .as_deref()
                .and_then(title_word)
                .ok_or(CkError::IncompleteRecord { field: "title" })?;
            format!("{}{}{}", author, year, title).to_lowercase()
        }
        KeyPolicy::InitialsShortYear => {
            format!("{}{}", initials(&surnames(record)), short_year(year_of(record)?))
        }
        KeyPolicy::InitialsFullYear => {
            format!("{}{}", initials(&surnames(record)), year_of(record)?)
        }
    };

    Ok(CitationKey::new(raw)?)
}

/// Initials of up to four authors; with five or more, three initials and `+`.
pub fn initials(surnames: &[String]) -> String {
    if surnames.is_empty() {
        return NO_AUTHOR.to_string();
    }
    let take = if surnames.len() > MAX_INITIALS {
        MAX_INITIALS - 1
    } else {
        surnames.len()
    };
    let mut out: String = surnames
        .iter()
        .take(take)
        .filter_map(|s| s.chars().next())
        .flat_map(char::to_uppercase)
        .collect();
    if surnames.len() > MAX_INITIALS {
        out.push('+');
    }
    out
}

/// Key-safe surnames of the record's authors, in order.
///
/// Accented letters are folded to ASCII (`Müller` → `Muller`); letters with
/// no ASCII decomposition (`Ø`, `王`) are kept as they are.
pub fn surnames(record: &BibRecord) -> Vec<String> {
    record
        .authors()
        .iter()
        .map(|name| fold_for_key(&name.surname()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// First title word that is not a stop word; the first word otherwise.
pub fn title_word(title: &str) -> Option<String> {
    let words: Vec<String> = title
        .split_whitespace()
        .map(fold_for_key)
        .filter(|w| !w.is_empty())
        .collect();

    words
        .iter()
        .find(|w| !STOP_WORDS.contains(w.to_lowercase().as_str()))
        .or_else(|| words.first())
        .cloned()
}

fn year_of(record: &BibRecord) -> Result<i32> {
    record.year().ok_or(CkError::IncompleteRecord { field: "year" })
}

fn short_year(year: i32) -> String {
    format!("{:02}", year.rem_euclid(100))
}

/// Keep alphanumerics, replacing accented letters by their ASCII base.
fn fold_for_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().filter(|c| c.is_alphanumeric()) {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let base: String = std::iter::once(c)
            .nfkd()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        if base.is_empty() {
            out.push(c);
        } else {
            out.push_str(&base);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ck_bibtex::EntryType;
    use rstest::rstest;

    fn record(author: Option<&str>, year: Option<&str>, title: Option<&str>) -> BibRecord {
        let mut r = BibRecord::new(EntryType::Article, "orig:key");
        if let Some(a) = author {
            r.set("author", a);
        }
        if let Some(y) = year {
            r.set("year", y);
        }
        if let Some(t) = title {
            r.set("title", t);
        }
        r
    }

    fn catena() -> BibRecord {
        record(
            Some("Tomescu, Alin and Devadas, Srinivas"),
            Some("2017"),
            Some("{Catena}: Efficient Non-equivocation via {Bitcoin}"),
        )
    }

    #[rstest]
    #[case(KeyPolicy::KeepOriginal, "orig:key")]
    #[case(KeyPolicy::FirstAuthorYearTitle, "tomescu17catena")]
    #[case(KeyPolicy::InitialsShortYear, "TD17")]
    #[case(KeyPolicy::InitialsFullYear, "TD2017")]
    fn policies(#[case] policy: KeyPolicy, #[case] expected: &str) {
        assert_eq!(candidate(&catena(), policy).unwrap().as_str(), expected);
    }

    #[test]
    fn five_authors_abbreviate() {
        let r = record(Some("A, X and B, X and C, X and D, X and E, X"), Some("2019"), None);
        assert_eq!(candidate(&r, KeyPolicy::InitialsShortYear).unwrap().as_str(), "ABC+19");
    }

    #[test]
    fn four_authors_keep_all_initials() {
        let r = record(Some("Alpha and Beta and Gamma and Delta"), Some("2021"), None);
        assert_eq!(candidate(&r, KeyPolicy::InitialsFullYear).unwrap().as_str(), "ABGD2021");
    }

    #[test]
    fn solo_author_uses_four_letter_prefix() {
        let r = record(
            Some("Satoshi Nakamoto"),
            Some("2008"),
            Some("Bitcoin: A Peer-to-Peer Electronic Cash System"),
        );
        assert_eq!(
            candidate(&r, KeyPolicy::FirstAuthorYearTitle).unwrap().as_str(),
            "naka08bitcoin"
        );
    }

    #[test]
    fn short_solo_surname_is_kept_whole() {
        let r = record(Some("Wei Dai"), Some("1998"), Some("b-money"));
        assert_eq!(
            candidate(&r, KeyPolicy::FirstAuthorYearTitle).unwrap().as_str(),
            "dai98bmoney"
        );
    }

    #[test]
    fn zero_authors_use_sentinel() {
        let r = record(None, Some("2015"), Some("Ethereum Yellow Paper"));
        assert_eq!(candidate(&r, KeyPolicy::InitialsShortYear).unwrap().as_str(), "Anon15");
        assert_eq!(
            candidate(&r, KeyPolicy::FirstAuthorYearTitle).unwrap().as_str(),
            "anon15ethereum"
        );
    }

    #[test]
    fn institutional_author_is_one_surname() {
        let r = record(Some("{Ethereum Foundation}"), Some("2015"), Some("Yellow Paper"));
        assert_eq!(candidate(&r, KeyPolicy::InitialsShortYear).unwrap().as_str(), "E15");
    }

    #[test]
    fn stop_word_titles_fall_back_to_first_word() {
        assert_eq!(title_word("The Of And").as_deref(), Some("The"));
        assert_eq!(title_word("On the Security of Things").as_deref(), Some("Security"));
        assert_eq!(title_word("  "), None);
    }

    #[test]
    fn non_ascii_names() {
        let r = record(Some("Müller, Hans and Øster, Ida and 王, 小明"), Some("2020"), None);
        assert_eq!(surnames(&r), vec!["Muller", "Øster", "王"]);
        assert_eq!(candidate(&r, KeyPolicy::InitialsShortYear).unwrap().as_str(), "MØ王20");
    }

    #[test]
    fn shared_initials_are_not_merged() {
        let r = record(Some("Smith and Sanders"), Some("2010"), None);
        assert_eq!(candidate(&r, KeyPolicy::InitialsShortYear).unwrap().as_str(), "SS10");
    }

    #[test]
    fn missing_fields() {
        let r = record(Some("Smith"), None, Some("Title"));
        assert!(matches!(
            candidate(&r, KeyPolicy::InitialsShortYear),
            Err(CkError::IncompleteRecord { field: "year" })
        ));
        let r = record(Some("Smith"), Some("2010"), None);
        assert!(matches!(
            candidate(&r, KeyPolicy::FirstAuthorYearTitle),
            Err(CkError::IncompleteRecord { field: "title" })
        ));
        let mut r = catena();
        r.cite_key = " ".to_string();
        assert!(candidate(&r, KeyPolicy::KeepOriginal).is_err());
    }

    #[test]
    fn collision_is_reported_not_resolved() {
        let in_use = BTreeSet::from([CitationKey::new("TD17").unwrap()]);
        match derive(&catena(), KeyPolicy::InitialsShortYear, &in_use) {
            Err(CkError::KeyCollision { key }) => assert_eq!(key.as_str(), "TD17"),
            other => panic!("expected collision, got {:?}", other),
        }
        let key = derive(&catena(), KeyPolicy::InitialsFullYear, &in_use).unwrap();
        assert_eq!(key.as_str(), "TD2017");
    }

    #[test]
    fn policy_names() {
        assert_eq!(KeyPolicy::default(), KeyPolicy::InitialsShortYear);
        assert_eq!(KeyPolicy::FirstAuthorYearTitle.to_string(), "first-author-year-title");
    }
}
