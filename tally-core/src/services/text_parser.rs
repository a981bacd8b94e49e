//! Free-text record parser
//!
//! Recovers (identifier, name, amount) triples from unstructured lines when
//! no spreadsheet is available. Each line goes through an ordered list of
//! strategies and the first one that succeeds wins; lines nobody recognizes
//! are skipped. A whole-file check runs afterwards: a file in which no line
//! carries an issued `NNNNNNNN-NNNNN` identifier is treated as garbage.

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{is_canonical_id, normalize_amount};

/// Encodings tried, in order, when a text file has no BOM
pub const DEFAULT_TEXT_ENCODINGS: &[&str] = &["utf-8", "euc-kr", "windows-1251"];

/// Identifier, then a run of letters, then a trailing number
static BOUNDARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|\s)(\d{8}-\d{5}|\d+)\s+([\p{Cyrillic}\p{Latin}\p{Hangul}][\p{Cyrillic}\p{Latin}\p{Hangul}\s]*?)\s*(\d[\d\s.,]*)$",
    )
    .expect("valid boundary regex")
});

static NUMERIC_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d.,]+$").expect("valid numeric token regex"));

/// How a line was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Delimited,
    Boundary,
    Whitespace,
}

/// One recovered line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRecord {
    pub member_id: String,
    pub name: Option<String>,
    /// Amount text as written, or descriptive text standing in for it
    pub raw: Option<String>,
    pub amount: Option<Decimal>,
    pub memo: Option<String>,
    /// 1-based line number
    pub line: usize,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextParseStatus {
    Parsed,
    /// Not a single line was recognized
    NoRecords,
    /// Lines were recognized but none had an issued identifier; all were dropped
    NoCanonicalIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextParseOutcome {
    pub status: TextParseStatus,
    pub encoding: String,
    pub records: Vec<TextRecord>,
    /// Lines extracted before the whole-file check
    pub extracted: usize,
}

type LineStrategy = fn(&str) -> Option<TextRecord>;

/// Strategies in priority order
const STRATEGIES: &[LineStrategy] = &[split_delimited, match_boundary, split_whitespace];

/// Parse one line, trying each strategy in turn
pub fn parse_line(line: &str) -> Option<TextRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    STRATEGIES.iter().find_map(|strategy| strategy(line))
}

/// `[seq /] id / name / amount [/ memo...]`
fn split_delimited(line: &str) -> Option<TextRecord> {
    if !line.contains('/') {
        return None;
    }
    let tokens: Vec<&str> = line.split('/').map(str::trim).collect();
    if tokens.len() < 3 {
        return None;
    }

    let id_idx = tokens
        .iter()
        .take(2)
        .position(|t| is_canonical_id(t))
        .or_else(|| {
            if tokens.len() >= 4 && has_digit(tokens[1]) {
                Some(1)
            } else if has_digit(tokens[0]) {
                Some(0)
            } else {
                None
            }
        })?;

    let name_idx = id_idx + 1;
    let name = tokens.get(name_idx).filter(|n| !n.is_empty())?;
    let trailing: Vec<(usize, &str)> = tokens
        .iter()
        .enumerate()
        .skip(name_idx + 1)
        .filter(|(_, t)| !t.is_empty())
        .map(|(i, t)| (i, *t))
        .collect();

    let amount_pos = trailing
        .iter()
        .rposition(|(_, t)| has_digit(t))
        .or_else(|| trailing.len().checked_sub(1))?;
    let raw = trailing[amount_pos].1;
    let memo: Vec<&str> = trailing
        .iter()
        .enumerate()
        .filter(|(pos, _)| *pos != amount_pos)
        .map(|(_, (_, t))| *t)
        .collect();

    Some(TextRecord {
        member_id: tokens[id_idx].to_string(),
        name: Some(name.to_string()),
        raw: Some(raw.to_string()),
        amount: normalize_amount(raw),
        memo: (!memo.is_empty()).then(|| memo.join(" / ")),
        line: 0,
        strategy: Strategy::Delimited,
    })
}

/// `id Name Surname 5 000` where the letters end and the number begins
fn match_boundary(line: &str) -> Option<TextRecord> {
    let caps = BOUNDARY_RE.captures(line)?;
    let raw = caps[3].trim();
    Some(TextRecord {
        member_id: caps[1].to_string(),
        name: Some(collapse_spaces(&caps[2])).filter(|n| !n.is_empty()),
        raw: Some(raw.to_string()),
        amount: normalize_amount(raw),
        memo: None,
        line: 0,
        strategy: Strategy::Boundary,
    })
}

/// Last resort: whitespace tokens with a numeric last token
fn split_whitespace(line: &str) -> Option<TextRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    let last = tokens.len() - 1;
    if !NUMERIC_TOKEN_RE.is_match(tokens[last]) {
        return None;
    }

    let id_idx = tokens
        .iter()
        .take(2)
        .position(|t| is_canonical_id(t))
        .or_else(|| (tokens.len() >= 4 && has_digit(tokens[1])).then_some(1))
        .or_else(|| has_digit(tokens[0]).then_some(0))?;

    let name = tokens[id_idx + 1..last].join(" ");
    Some(TextRecord {
        member_id: tokens[id_idx].to_string(),
        name: Some(name).filter(|n| !n.is_empty()),
        raw: Some(tokens[last].to_string()),
        amount: normalize_amount(tokens[last]),
        memo: None,
        line: 0,
        strategy: Strategy::Whitespace,
    })
}

fn has_digit(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode text bytes.
///
/// A BOM decides the encoding outright, and so does a clean UTF-8 decode.
/// Otherwise every listed encoding is tried strictly and the decode with the
/// fewest out-of-place characters wins, earlier encodings winning ties. If
/// none decodes cleanly the bytes are read as UTF-8 with replacement
/// characters.
pub fn decode_text<'a>(bytes: &'a [u8], encodings: &[String]) -> (Cow<'a, str>, &'static str) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text, encoding.name());
    }

    let mut best: Option<(usize, Cow<'a, str>, &'static str)> = None;
    for label in encodings {
        let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
            continue;
        };
        let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) else {
            continue;
        };
        let score = if encoding == UTF_8 { 0 } else { oddness(&text) };
        if score == 0 {
            return (text, encoding.name());
        }
        if best.as_ref().map_or(true, |(s, _, _)| score < *s) {
            best = Some((score, text, encoding.name()));
        }
    }

    match best {
        Some((_, text, name)) => (text, name),
        None => (String::from_utf8_lossy(bytes), "UTF-8 (lossy)"),
    }
}

/// Characters that do not belong in a member list: Han ideographs and
/// stray symbols.
///
/// A legacy encoding applied to the wrong bytes rarely fails outright, but it
/// produces exactly these. Korean text mixed with Russian names is normal and
/// costs nothing.
fn oddness(text: &str) -> usize {
    text.chars()
        .filter(|&c| !(c.is_ascii() || c.is_whitespace() || is_neutral_mark(c) || is_member_letter(c)))
        .count()
}

/// Hangul, Cyrillic or accented Latin letters
fn is_member_letter(c: char) -> bool {
    match c {
        '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}' => true,
        '\u{0400}'..='\u{04FF}' => true,
        '\u{00C0}'..='\u{024F}' => c.is_alphabetic(),
        _ => false,
    }
}

/// Punctuation that legitimately shows up in Korean and Russian text
fn is_neutral_mark(c: char) -> bool {
    matches!(c, '\u{2010}'..='\u{2027}' | '\u{2030}'..='\u{205E}' | '№' | '«' | '»' | '\u{00A0}' | '·')
}

/// Parses whole text files
#[derive(Debug, Clone)]
pub struct TextParser {
    encodings: Vec<String>,
}

impl Default for TextParser {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_ENCODINGS.iter().map(|e| e.to_string()).collect())
    }
}

impl TextParser {
    pub fn new(encodings: Vec<String>) -> Self {
        Self { encodings }
    }

    pub fn encodings(&self) -> &[String] {
        &self.encodings
    }

    /// Decode and parse a file's bytes
    pub fn parse_bytes(&self, bytes: &[u8]) -> TextParseOutcome {
        let (text, encoding) = decode_text(bytes, &self.encodings);
        let mut outcome = self.parse_str(&text);
        outcome.encoding = encoding.to_string();
        outcome
    }

    /// Parse already-decoded text
    pub fn parse_str(&self, text: &str) -> TextParseOutcome {
        let mut records: Vec<TextRecord> = text
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                parse_line(line).map(|mut record| {
                    record.line = idx + 1;
                    record
                })
            })
            .collect();
        let extracted = records.len();

        let status = if records.is_empty() {
            TextParseStatus::NoRecords
        } else if !records.iter().any(|r| is_canonical_id(&r.member_id)) {
            records.clear();
            TextParseStatus::NoCanonicalIdentifier
        } else {
            TextParseStatus::Parsed
        };

        TextParseOutcome {
            status,
            encoding: "UTF-8".to_string(),
            records,
            extracted,
        }
    }
}
