//! Calendar month a snapshot belongs to

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::result::Error;

/// Folder names that pin the period of every file inside them.
static FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})\.(\d{2})$").expect("valid period folder regex"));

/// `YYYY.MM` or `YY.MM` anywhere in a file stem, not glued to other digits.
static STEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{4}|\d{2})\.(\d{2})(?:\D|$)").expect("valid period stem regex")
});

/// A (year, month) pair. Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Build a period, rejecting months outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Derive the period of a source from its location.
    ///
    /// The parent folder wins when it is named exactly `YYYY.MM`; otherwise
    /// the file stem is searched for a `YYYY.MM` or `YY.MM` token. Two-digit
    /// years are read as 20YY.
    pub fn infer(path: &Path) -> Option<Self> {
        let from_folder = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .and_then(|name| FOLDER_RE.captures(name))
            .and_then(|caps| Self::from_parts(&caps[1], &caps[2]));

        from_folder.or_else(|| {
            let stem = path.file_stem()?.to_str()?;
            Self::from_stem(stem)
        })
    }

    /// Search a bare name (no extension) for a period token
    pub fn from_stem(stem: &str) -> Option<Self> {
        let caps = STEM_RE.captures(stem)?;
        Self::from_parts(&caps[1], &caps[2])
    }

    fn from_parts(year: &str, month: &str) -> Option<Self> {
        let mut y: i32 = year.parse().ok()?;
        if year.len() == 2 {
            y += 2000;
        }
        Self::new(y, month.parse().ok()?)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}.{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        FOLDER_RE
            .captures(s)
            .and_then(|caps| Self::from_parts(&caps[1], &caps[2]))
            .ok_or_else(|| Error::validation(format!("Invalid period '{}', expected YYYY.MM", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_folder_name_wins_over_stem() {
        let path = PathBuf::from("/data/2024.03/report 23.11.xlsx");
        assert_eq!(Period::infer(&path), Period::new(2024, 3));
    }

    #[test]
    fn test_stem_with_two_digit_year() {
        let path = PathBuf::from("/data/inbox/십일조 24.07 북부.csv");
        assert_eq!(Period::infer(&path), Period::new(2024, 7));
    }

    #[test]
    fn test_stem_with_four_digit_year() {
        let path = PathBuf::from("merged-2025.01.csv");
        assert_eq!(Period::infer(&path), Period::new(2025, 1));
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        assert_eq!(Period::infer(&PathBuf::from("report 2024.13.csv")), None);
        assert_eq!(Period::infer(&PathBuf::from("/data/2024.00/a.csv")), None);
    }

    #[test]
    fn test_no_period_token() {
        assert_eq!(Period::infer(&PathBuf::from("/data/north/list.csv")), None);
    }

    #[test]
    fn test_display_and_parse() {
        let p = Period::new(2024, 3).unwrap();
        assert_eq!(p.to_string(), "2024.03");
        assert_eq!("2024.03".parse::<Period>().unwrap(), p);
        assert!("2024-03".parse::<Period>().is_err());
    }

    #[test]
    fn test_ordering_is_chronological() {
        let a = Period::new(2023, 12).unwrap();
        let b = Period::new(2024, 1).unwrap();
        let c = Period::new(2024, 2).unwrap();
        assert!(a < b && b < c);
    }
}
