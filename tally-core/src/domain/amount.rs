//! Amount normalization and the paid predicate

use std::str::FromStr;

use rust_decimal::Decimal;

/// Single-glyph cells that mean "paid" without giving a sum.
const PAID_MARKERS: &[&str] = &["o", "O", "○", "◯", "⭕", "〇", "ㅇ", "✓", "✔", "V", "v"];

/// Cleaned leftovers that carry no number at all.
const EMPTY_FORMS: &[&str] = &["", "-", ".", "-."];

/// Parse a raw amount cell into a decimal.
///
/// Returns `None` for blanks, lone dashes and anything that does not reduce to
/// a number. Paid markers (`o`, `○`, `✓`, ...) count as 1. Digit grouping is
/// told apart from a decimal comma: `1,000` is one thousand, `1,5` is one and
/// a half, `1.234,56` and `1,234.56` are the same value.
pub fn normalize_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if PAID_MARKERS.contains(&trimmed) {
        return Some(Decimal::ONE);
    }

    let kept: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    let cleaned = resolve_separators(&kept);
    if EMPTY_FORMS.contains(&cleaned.as_str()) {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Rewrite `,` and `.` so that at most one `.` (the decimal point) remains.
fn resolve_separators(s: &str) -> String {
    let commas = s.matches(',').count();
    let dots = s.matches('.').count();

    match (commas, dots) {
        (0, 0) => s.to_string(),
        (0, 1) => s.to_string(),
        (0, _) => s.replace('.', ""),
        (1, 0) => {
            let after = s.split(',').nth(1).unwrap_or("");
            if after.len() == 3 && after.chars().all(|c| c.is_ascii_digit()) {
                s.replace(',', "")
            } else {
                s.replace(',', ".")
            }
        }
        (_, 0) => s.replace(',', ""),
        _ => {
            let last_comma = s.rfind(',');
            let last_dot = s.rfind('.');
            if last_comma > last_dot {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
    }
}

/// Whether a cell counts as paid.
///
/// A parsed amount is paid when positive. Without an amount, the raw text
/// is paid evidence only if it holds something besides digits, whitespace,
/// separators and signs, so a memo like "송금완료" counts and a bare "-" does not.
pub fn is_paid(raw: Option<&str>, amount: Option<Decimal>) -> bool {
    match amount {
        Some(value) => value > Decimal::ZERO,
        None => raw.is_some_and(|text| {
            text.chars().any(|c| {
                !(c.is_ascii_digit() || c.is_whitespace() || matches!(c, ',' | '.' | '\'' | '-' | '+'))
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: &str) -> Decimal {
        Decimal::from_str(v).unwrap()
    }

    #[test]
    fn test_grouping_comma() {
        assert_eq!(normalize_amount("1,000"), Some(dec("1000")));
        assert_eq!(normalize_amount("1,000,000"), Some(dec("1000000")));
        assert_eq!(normalize_amount("₩ 10,000원"), Some(dec("10000")));
    }

    #[test]
    fn test_decimal_point_and_comma() {
        assert_eq!(normalize_amount("1.5"), Some(dec("1.5")));
        assert_eq!(normalize_amount("1,5"), Some(dec("1.5")));
        assert_eq!(normalize_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(normalize_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(normalize_amount("1.234.567"), Some(dec("1234567")));
    }

    #[test]
    fn test_spaces_and_apostrophes() {
        assert_eq!(normalize_amount("2 000"), Some(dec("2000")));
        assert_eq!(normalize_amount("2\u{00A0}000"), Some(dec("2000")));
        assert_eq!(normalize_amount("1'500"), Some(dec("1500")));
    }

    #[test]
    fn test_markers_count_as_one() {
        for marker in ["o", "O", "○", "ㅇ", "✓", " v "] {
            assert_eq!(normalize_amount(marker), Some(Decimal::ONE), "{marker}");
        }
    }

    #[test]
    fn test_absent_never_zero() {
        for raw in ["", "   ", "-", ".", "-.", "미납", "n/a"] {
            assert_eq!(normalize_amount(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn test_unparsable_is_absent() {
        assert_eq!(normalize_amount("100-200"), None);
    }

    #[test]
    fn test_is_paid_with_amount() {
        assert!(is_paid(Some("500"), Some(dec("500"))));
        assert!(!is_paid(Some("0"), Some(Decimal::ZERO)));
        assert!(!is_paid(Some("-100"), Some(dec("-100"))));
    }

    #[test]
    fn test_is_paid_with_descriptive_text() {
        assert!(is_paid(Some("송금완료"), None));
        assert!(is_paid(Some("paid in cash"), None));
        assert!(!is_paid(Some("-"), None));
        assert!(!is_paid(Some("  "), None));
        assert!(!is_paid(None, None));
    }
}
