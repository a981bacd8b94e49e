//! Column labels: normalization and the canonical field set

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::Error;

/// Characters that carry no meaning in a header and are dropped outright.
const INVISIBLE: &[char] = &['\u{FEFF}', '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}'];

/// Canonicalize a raw column label for comparison.
///
/// Drops the BOM and zero-width characters, removes every whitespace
/// character (non-breaking spaces included) and lowercases the rest.
/// The result is idempotent: normalizing twice gives the same string.
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| !INVISIBLE.contains(c))
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Semantic fields a source column can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    MemberId,
    Region,
    Team,
    Zone,
    Department,
    NameLocal,
    NameLatin,
    Attendance,
    Amount,
    Memo,
}

impl CanonicalField {
    /// Every field, in export column order
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::MemberId,
        CanonicalField::Region,
        CanonicalField::Team,
        CanonicalField::Zone,
        CanonicalField::Department,
        CanonicalField::NameLocal,
        CanonicalField::NameLatin,
        CanonicalField::Attendance,
        CanonicalField::Amount,
        CanonicalField::Memo,
    ];

    /// Stable snake_case key used in settings and exports
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::MemberId => "member_id",
            CanonicalField::Region => "region",
            CanonicalField::Team => "team",
            CanonicalField::Zone => "zone",
            CanonicalField::Department => "department",
            CanonicalField::NameLocal => "name_local",
            CanonicalField::NameLatin => "name_latin",
            CanonicalField::Attendance => "attendance",
            CanonicalField::Amount => "amount",
            CanonicalField::Memo => "memo",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CanonicalField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.key() == wanted)
            .ok_or_else(|| Error::config(format!("Unknown field '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_bom_and_zero_width() {
        assert_eq!(normalize_header("\u{FEFF}고유번호"), "고유번호");
        assert_eq!(normalize_header("Mem\u{200B}ber\u{2060}ID"), "memberid");
    }

    #[test]
    fn test_removes_all_whitespace_including_nbsp() {
        assert_eq!(normalize_header("  이름 (KR) "), "이름(kr)");
        assert_eq!(normalize_header("Member\u{00A0}Id\t"), "memberid");
    }

    #[test]
    fn test_field_keys_parse_back() {
        for field in CanonicalField::ALL {
            assert_eq!(field.key().parse::<CanonicalField>().unwrap(), field);
        }
        assert!("tithe".parse::<CanonicalField>().is_err());
    }

    #[test]
    fn test_idempotent() {
        for raw in ["\u{FEFF} Регион ", "이름(RU)", "AMOUNT\u{00A0}", "", "ＭＥＭＯ"] {
            let once = normalize_header(raw);
            assert_eq!(normalize_header(&once), once);
        }
    }
}
