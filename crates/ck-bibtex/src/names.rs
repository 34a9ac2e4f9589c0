//! BibTeX name lists.
//!
//! An `author` field is a list of names separated by the word `and` at brace
//! depth zero. Each name is either `Last, First`, `von Last, First` or
//! `First von Last`. A name wrapped entirely in braces (`{Ethereum
//! Foundation}`) is an institution and is kept whole.

use serde::{Deserialize, Serialize};

/// A parsed personal (or institutional) name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    pub von: String,
    pub last: String,
    pub institutional: bool,
}

impl PersonName {
    /// Parse one name from a name list.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if is_fully_braced(raw) {
            return Self {
                first: String::new(),
                von: String::new(),
                last: raw[1..raw.len() - 1].trim().to_string(),
                institutional: true,
            };
        }

        match split_top_level(raw, |c| c == ',').as_slice() {
            [last_part, rest @ ..] if !rest.is_empty() => {
                let (von, last) = split_von(&words(last_part));
                Self {
                    first: rest.join(",").trim().to_string(),
                    von,
                    last,
                    institutional: false,
                }
            }
            _ => {
                let tokens = words(raw);
                let Some((last, init)) = tokens.split_last() else {
                    return Self::empty();
                };
                // `von` words are the lower-case run just before the last name.
                let von_start = init
                    .iter()
                    .enumerate()
                    .skip(1)
                    .find(|(_, w)| starts_lowercase(w))
                    .map(|(i, _)| i)
                    .unwrap_or(init.len());
                Self {
                    first: init[..von_start].join(" "),
                    von: init[von_start..].join(" "),
                    last: (*last).to_string(),
                    institutional: false,
                }
            }
        }
    }

    fn empty() -> Self {
        Self {
            first: String::new(),
            von: String::new(),
            last: String::new(),
            institutional: false,
        }
    }

    /// The surname with braces and LaTeX control characters removed.
    pub fn surname(&self) -> String {
        self.last
            .chars()
            .filter(|c| !matches!(c, '{' | '}' | '\\' | '"' | '\'' | '`' | '^' | '~'))
            .collect()
    }
}

/// Split a name list on top-level ` and ` (case-insensitive).
pub fn split_names(field: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let bytes = field.as_bytes();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b if depth == 0 && b.is_ascii_whitespace() => {
                if let Some(len) = and_separator_len(&bytes[i..]) {
                    names.push(&field[start..i]);
                    i += len;
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    names.push(&field[start..]);

    names
        .into_iter()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect()
}

/// Length of a `<ws>and<ws>` separator at the start of `bytes`.
fn and_separator_len(bytes: &[u8]) -> Option<usize> {
    let lead = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let word = bytes.get(lead..lead + 3)?;
    if !word.eq_ignore_ascii_case(b"and") {
        return None;
    }
    let trail = bytes[lead + 3..]
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    (trail > 0).then_some(lead + 3 + trail)
}

fn is_fully_braced(s: &str) -> bool {
    if !(s.starts_with('{') && s.ends_with('}')) {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i + 1 < s.len() {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

/// Split at characters matching `sep` outside braces.
fn split_top_level(s: &str, sep: impl Fn(char) -> bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if depth == 0 && sep(c) => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn words(s: &str) -> Vec<&str> {
    split_top_level(s, char::is_whitespace)
        .into_iter()
        .filter(|w| !w.is_empty())
        .collect()
}

fn split_von(tokens: &[&str]) -> (String, String) {
    let von_len = tokens
        .iter()
        .take(tokens.len().saturating_sub(1))
        .take_while(|w| starts_lowercase(w))
        .count();
    (tokens[..von_len].join(" "), tokens[von_len..].join(" "))
}

fn starts_lowercase(word: &str) -> bool {
    word.chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(char::is_lowercase)
        && !word.starts_with('{')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn split_on_and() {
        assert_eq!(
            split_names("Alin Tomescu and Srinivas Devadas"),
            vec!["Alin Tomescu", "Srinivas Devadas"]
        );
        assert_eq!(split_names("A AND B\n and C"), vec!["A", "B", "C"]);
    }

    #[test]
    fn split_keeps_braced_and() {
        assert_eq!(
            split_names("{Barnes and Noble} and Jane Doe"),
            vec!["{Barnes and Noble}", "Jane Doe"]
        );
    }

    #[test]
    fn split_ignores_and_inside_words() {
        assert_eq!(split_names("Sandy Anderson"), vec!["Sandy Anderson"]);
        assert!(split_names("  ").is_empty());
    }

    #[rstest]
    #[case("Tomescu, Alin", "Alin", "", "Tomescu")]
    #[case("Alin Tomescu", "Alin", "", "Tomescu")]
    #[case("von Neumann, John", "John", "von", "Neumann")]
    #[case("Ludwig van Beethoven", "Ludwig", "van", "Beethoven")]
    #[case("Devadas", "", "", "Devadas")]
    #[case("Jean-Pierre {de la Fontaine}", "Jean-Pierre", "", "{de la Fontaine}")]
    fn parse_name_forms(
        #[case] raw: &str,
        #[case] first: &str,
        #[case] von: &str,
        #[case] last: &str,
    ) {
        let name = PersonName::parse(raw);
        assert_eq!(name.first, first);
        assert_eq!(name.von, von);
        assert_eq!(name.last, last);
        assert!(!name.institutional);
    }

    #[test]
    fn institutional_name() {
        let name = PersonName::parse("{Ethereum Foundation}");
        assert!(name.institutional);
        assert_eq!(name.last, "Ethereum Foundation");
        assert_eq!(name.surname(), "Ethereum Foundation");
    }

    #[test]
    fn surname_strips_latex() {
        assert_eq!(PersonName::parse("M{\\\"u}ller, Hans").surname(), "Muller");
        assert_eq!(PersonName::parse("Kurt G{\\\"o}del").surname(), "Godel");
    }
}
