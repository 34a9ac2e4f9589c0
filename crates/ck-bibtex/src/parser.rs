//! BibTeX parser built on nom.
//!
//! Handles:
//! - `@string` definitions (expanded in later values, case-insensitive)
//! - `@preamble` and `@comment` blocks (skipped)
//! - braced, quoted, numeric and macro field values joined with `#`
//! - `{...}` and `(...)` entry delimiters
//!
//! Text outside `@` blocks is treated as a comment, as BibTeX does.

use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{map, opt},
    error::{Error as NomError, ErrorKind},
    sequence::{delimited, preceded},
    IResult,
};

use crate::record::{BibRecord, EntryType};

type Res<'a, T> = IResult<&'a str, T>;
type Macros = HashMap<String, String>;

/// Errors produced while reading a metadata file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("input is not valid UTF-8 (first bad byte at offset {offset})")]
    Encoding { offset: usize },
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
    },
    #[error("no BibTeX entry found")]
    NoEntry,
    #[error("expected exactly one BibTeX entry, found {count}")]
    MultipleEntries { count: usize },
}

/// Parse a metadata file holding exactly one record.
pub fn parse(input: &[u8]) -> Result<BibRecord, ParseError> {
    let text = std::str::from_utf8(input).map_err(|e| ParseError::Encoding {
        offset: e.valid_up_to(),
    })?;
    let mut records = parse_all(text)?;
    match records.len() {
        0 => Err(ParseError::NoEntry),
        1 => Ok(records.remove(0)),
        count => Err(ParseError::MultipleEntries { count }),
    }
}

/// Parse every entry in a BibTeX string.
///
/// Unlike a lenient bulk importer this stops at the first malformed block:
/// a metadata file that does not parse cleanly must not be rewritten.
pub fn parse_all(text: &str) -> Result<Vec<BibRecord>, ParseError> {
    let mut macros = Macros::new();
    let mut records = Vec::new();
    let mut rest = skip_junk(text);

    while !rest.is_empty() {
        let (after, block) = at_block(rest, &macros).map_err(|e| syntax_error(text, e))?;
        match block {
            Block::Entry(record) => records.push(record),
            Block::Macro(name, value) => {
                macros.insert(name.to_ascii_lowercase(), value);
            }
            Block::Ignored => {}
        }
        rest = skip_junk(after);
    }

    Ok(records)
}

enum Block {
    Entry(BibRecord),
    Macro(String, String),
    Ignored,
}

/// Advance to the next `@` that starts a line-level block.
fn skip_junk(mut input: &str) -> &str {
    loop {
        input = input.trim_start();
        if input.is_empty() || input.starts_with('@') {
            return input;
        }
        let line_end = input.find('\n').unwrap_or(input.len());
        let line = &input[..line_end];
        if !line.starts_with('%') {
            if let Some(at) = line.find('@') {
                input = &input[at..];
                continue;
            }
        }
        input = &input[line_end..];
    }
}

fn at_block<'a>(input: &'a str, macros: &Macros) -> Res<'a, Block> {
    let (rest, _) = char('@')(input)?;
    let (rest, kind) = preceded(multispace0, take_while1(|c: char| c.is_ascii_alphanumeric()))(rest)?;
    let (rest, _) = multispace0(rest)?;

    match kind.to_ascii_lowercase().as_str() {
        "comment" => {
            let (rest, _) = alt((braced, rest_of_line))(rest)?;
            Ok((rest, Block::Ignored))
        }
        "preamble" => {
            let (rest, close) = open_delim(rest)?;
            let (rest, _) = preceded(multispace0, |i| field_value(i, macros))(rest)?;
            let (rest, _) = preceded(multispace0, char(close))(rest)?;
            Ok((rest, Block::Ignored))
        }
        "string" => {
            let (rest, close) = open_delim(rest)?;
            let (rest, (name, value)) = field(rest, macros)?;
            let (rest, _) = preceded(multispace0, char(close))(rest)?;
            Ok((rest, Block::Macro(name.to_string(), value)))
        }
        _ => {
            let (rest, record) = entry_body(rest, kind, macros)?;
            Ok((rest, Block::Entry(record)))
        }
    }
}

fn entry_body<'a>(input: &'a str, kind: &str, macros: &Macros) -> Res<'a, BibRecord> {
    let (rest, close) = open_delim(input)?;
    let (rest, cite_key) = preceded(multispace0, take_while1(is_key_char))(rest)?;
    let (mut rest, _) = preceded(multispace0, opt(char(',')))(rest)?;

    let mut record = BibRecord::new(EntryType::from_name(kind), cite_key);
    loop {
        let (r, _) = multispace0(rest)?;
        if let Some(r) = r.strip_prefix(close) {
            return Ok((r, record));
        }
        let (r, (name, value)) = field(r, macros)?;
        record.push_field(name, value);
        let (r, _) = preceded(multispace0, opt(char(',')))(r)?;
        rest = r;
    }
}

fn field<'a>(input: &'a str, macros: &Macros) -> Res<'a, (&'a str, String)> {
    let (rest, name) = preceded(multispace0, take_while1(is_name_char))(input)?;
    let (rest, _) = delimited(multispace0, char('='), multispace0)(rest)?;
    let (rest, value) = field_value(rest, macros)?;
    Ok((rest, (name, value)))
}

/// A value made of parts joined with `#`.
fn field_value<'a>(input: &'a str, macros: &Macros) -> Res<'a, String> {
    let (mut rest, mut value) = value_part(input, macros)?;
    loop {
        let (r, _) = multispace0(rest)?;
        let Some(r) = r.strip_prefix('#') else {
            return Ok((rest, value));
        };
        let (r, part) = preceded(multispace0, |i| value_part(i, macros))(r)?;
        value.push_str(&part);
        rest = r;
    }
}

fn value_part<'a>(input: &'a str, macros: &Macros) -> Res<'a, String> {
    alt((
        map(braced, |s: &str| s[1..s.len() - 1].to_string()),
        map(quoted, str::to_string),
        map(take_while1(|c: char| c.is_ascii_digit()), str::to_string),
        map(take_while1(is_name_char), |name: &str| {
            macros
                .get(&name.to_ascii_lowercase())
                .cloned()
                .unwrap_or_else(|| name.to_string())
        }),
    ))(input)
}

/// `{` or `(`; returns the matching closing delimiter.
fn open_delim(input: &str) -> Res<'_, char> {
    alt((map(char('{'), |_| '}'), map(char('('), |_| ')')))(input)
}

/// A balanced `{...}` group, outer braces included.
fn braced(input: &str) -> Res<'_, &str> {
    char('{')(input)?;
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], &input[..=i]));
                }
            }
            _ => {}
        }
    }
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Char)))
}

/// A `"..."` string; quotes inside braces do not terminate it and its
/// braces must balance.
fn quoted(input: &str) -> Res<'_, &str> {
    let (body, _) = char('"')(input)?;
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' if depth == 0 => {
                return Err(nom::Err::Failure(NomError::new(&body[i..], ErrorKind::Char)))
            }
            '}' => depth -= 1,
            '"' if depth == 0 => return Ok((&body[i + 1..], &body[..i])),
            _ => {}
        }
    }
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Char)))
}

fn rest_of_line(input: &str) -> Res<'_, &str> {
    let end = input.find('\n').unwrap_or(input.len());
    Ok((&input[end..], &input[..end]))
}

fn is_key_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ',' | '{' | '}' | '(' | ')' | '"' | '#' | '%' | '=')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '+' | '/')
}

fn syntax_error(source: &str, err: nom::Err<NomError<&str>>) -> ParseError {
    let (remaining, code) = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, e.code),
        nom::Err::Incomplete(_) => ("", ErrorKind::Eof),
    };
    let offset = source.len() - remaining.len();
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map(|l| l.chars().count())
        .unwrap_or(0) as u32
        + 1;
    let message = if remaining.is_empty() {
        "unexpected end of input".to_string()
    } else {
        format!("unexpected input ({})", code.description())
    };
    ParseError::Syntax {
        line,
        column,
        message,
    }
}
