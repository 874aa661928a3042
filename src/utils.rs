use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%d/%m/%y",
    "%m/%d/%y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%d-%b-%Y",
    "%d-%b-%y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    (1900..=2100).contains(&date.year()).then_some(date)
}

/// Coerce a free-form statement date into a calendar date.
///
/// Day-first layouts are tried before month-first ones, so `03/04/2024` is
/// the 3rd of April while `01/15/2024` still resolves to January 15th.
/// Years outside 1900..=2100 are treated as a mis-parse.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Some(date) = NaiveDate::parse_from_str(s, fmt).ok().and_then(plausible) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            if let Some(date) = plausible(dt.date()) {
                return Some(date);
            }
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return plausible(dt.date_naive());
    }

    None
}

/// Coerce a statement amount string into a signed number.
///
/// Understands currency symbols, thousands separators, accounting
/// parentheses and trailing `-`/`CR`/`DR` markers. Anything that is still
/// not a number becomes `0.0`.
pub fn coerce_amount(raw: &str) -> f64 {
    let mut s = raw.trim().to_string();
    if s.is_empty() {
        return 0.0;
    }

    let mut negative = false;

    if s.starts_with('(') && s.ends_with(')') {
        negative = true;
        s = s[1..s.len() - 1].trim().to_string();
    }

    let upper = s.to_ascii_uppercase();
    if upper.ends_with("DR") {
        negative = true;
        s.truncate(s.len() - 2);
    } else if upper.ends_with("CR") {
        s.truncate(s.len() - 2);
    }

    let s = s.trim();
    let (s, trailing_minus) = match s.strip_suffix('-') {
        Some(rest) => (rest.trim_end(), true),
        None => (s, false),
    };
    negative |= trailing_minus;

    if s.contains('-') {
        negative = !negative;
    }

    let mut digits: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    // "1.234,56" / "12,50": a comma followed by exactly two digits is a decimal comma.
    let decimal_comma = digits
        .rfind(',')
        .map(|idx| digits.len() - idx == 3 && !digits[idx..].contains('.'))
        .unwrap_or(false);
    if decimal_comma {
        digits = digits.replace('.', "").replace(',', ".");
    } else {
        digits = digits.replace(',', "");
    }

    match digits.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if negative {
                -v
            } else {
                v
            }
        }
        _ => 0.0,
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_common_statement_dates() {
        assert_eq!(normalize_date("2024-01-15"), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date(" 2024/01/15 "), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date("15/01/2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date("01/15/2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date("15.01.2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date("15 Jan 2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date("Jan 15, 2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date("15-Jan-2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date("2024-01-15 09:30:00"), Some(ymd(2024, 1, 15)));
        assert_eq!(normalize_date("2024-01-15T09:30:00Z"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_day_first_wins_for_ambiguous_dates() {
        assert_eq!(normalize_date("03/04/2024"), Some(ymd(2024, 4, 3)));
    }

    #[test]
    fn test_two_digit_years_are_not_read_as_year_24() {
        assert_eq!(normalize_date("15/01/24"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_reject_garbage_dates() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("Opening balance"), None);
        assert_eq!(normalize_date("2024-13-45"), None);
    }

    #[test]
    fn test_coerce_amounts() {
        assert_eq!(coerce_amount("25.99"), 25.99);
        assert_eq!(coerce_amount("-25.99"), -25.99);
        assert_eq!(coerce_amount("$1,234.50"), 1234.5);
        assert_eq!(coerce_amount("(12.50)"), -12.5);
        assert_eq!(coerce_amount("40.00 DR"), -40.0);
        assert_eq!(coerce_amount("40.00 CR"), 40.0);
        assert_eq!(coerce_amount("75.10-"), -75.1);
        assert_eq!(coerce_amount("1.234,56"), 1234.56);
        assert_eq!(coerce_amount("+300"), 300.0);
    }

    #[test]
    fn test_non_numeric_amounts_become_zero() {
        assert_eq!(coerce_amount(""), 0.0);
        assert_eq!(coerce_amount("n/a"), 0.0);
        assert_eq!(coerce_amount("--"), 0.0);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
