//! Best-effort parsing of event dates scraped from arbitrary pages.
//!
//! Parsing order:
//! 1. Whole-string formats: RFC 3339, RFC 2822 and a list of common layouts.
//! 2. Fuzzy token extraction: an embedded ISO timestamp, or a month name with a
//!    day (and optional year) anywhere in the text.
//! 3. Explicit numeric fallbacks, in priority order ISO (`YYYY-MM-DD`,
//!    `YYYY/MM/DD`), US (`MM/DD/YY[YY]`), European (`DD.MM.YY[YY]`).
//!
//! Known limitation: `03/04/2025` is read as March 4 because the US pattern is
//! tried before the European one. Nothing here can tell the two apart.
//!
//! Naive values are interpreted as UTC. Nothing ever panics or errors; an
//! unrecognized string yields `None`.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

/// Layouts carrying an explicit offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Naive date-time layouts, read as UTC.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%B %d, %Y %H:%M",
    "%B %d, %Y %I:%M %p",
];

/// Date-only layouts, read as midnight UTC.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%A, %B %d, %Y",
    "%A %B %d, %Y",
    "%A, %d %B %Y",
];

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

static EMBEDDED_ISO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?",
    )
    .expect("valid regex")
});

// "March 3rd, 2025", "Mar 3-5 2025", "Tuesday, March 4"
static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:\s*[-–]\s*\d{{1,2}}(?:st|nd|rd|th)?\b)?(?:,?\s*(\d{{4}})\b)?"
    ))
    .expect("valid regex")
});

// "15 March 2025", "3rd of June"
static DAY_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?(?:\s+of)?\s+({MONTHS})\b\.?(?:,?\s*(\d{{4}})\b)?"
    ))
    .expect("valid regex")
});

static ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b").expect("valid regex"));

static US_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").expect("valid regex")
});

static EU_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4}|\d{2})\b").expect("valid regex")
});

/// Parse a date relative to the current UTC day.
///
/// The reference day only matters for month/day strings without a year.
pub fn parse_date(input: Option<&str>) -> Option<DateTime<FixedOffset>> {
    parse_date_relative(input, Utc::now().date_naive())
}

/// Parse a date, filling a missing year from `today`.
pub fn parse_date_relative(input: Option<&str>, today: NaiveDate) -> Option<DateTime<FixedOffset>> {
    let text = input?.trim();
    if text.is_empty() {
        return None;
    }

    let parsed = parse_exact(text)
        .or_else(|| parse_fuzzy(text, today))
        .or_else(|| parse_numeric_fallback(text));

    if parsed.is_none() {
        tracing::debug!(input = text, "unparseable date");
    }
    parsed
}

fn parse_exact(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt);
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt);
    }
    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(naive.and_utc().fixed_offset());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(midnight_utc)
}

fn parse_fuzzy(text: &str, today: NaiveDate) -> Option<DateTime<FixedOffset>> {
    if let Some(found) = EMBEDDED_ISO_RE.find(text) {
        if let Some(dt) = parse_exact(found.as_str()) {
            return Some(dt);
        }
    }

    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        let month = month_number(&caps[1]);
        let day = caps[2].parse().ok();
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        if let Some(dt) = from_parts(year.unwrap_or(today.year()), month, day) {
            return Some(dt);
        }
    }

    if let Some(caps) = DAY_MONTH_RE.captures(text) {
        let day = caps[1].parse().ok();
        let month = month_number(&caps[2]);
        let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
        if let Some(dt) = from_parts(year.unwrap_or(today.year()), month, day) {
            return Some(dt);
        }
    }

    None
}

fn parse_numeric_fallback(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Some(caps) = ISO_RE.captures(text) {
        let year = caps[1].parse().ok()?;
        if let Some(dt) = from_parts(year, caps[2].parse().ok(), caps[3].parse().ok()) {
            return Some(dt);
        }
    }
    if let Some(caps) = US_RE.captures(text) {
        if let Some(dt) = from_parts(
            expand_year(&caps[3])?,
            caps[1].parse().ok(),
            caps[2].parse().ok(),
        ) {
            return Some(dt);
        }
    }
    if let Some(caps) = EU_RE.captures(text) {
        if let Some(dt) = from_parts(
            expand_year(&caps[3])?,
            caps[2].parse().ok(),
            caps[1].parse().ok(),
        ) {
            return Some(dt);
        }
    }
    None
}

/// Two-digit years below 50 belong to this century, the rest to the last.
fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    if raw.len() == 2 {
        Some(if year < 50 { 2000 + year } else { 1900 + year })
    } else {
        Some(year)
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_lowercase();
    let month = match lowered.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn from_parts(year: i32, month: Option<u32>, day: Option<u32>) -> Option<DateTime<FixedOffset>> {
    NaiveDate::from_ymd_opt(year, month?, day?).and_then(midnight_utc)
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn ymd(input: &str) -> Option<(i32, u32, u32)> {
        parse_date_relative(Some(input), today()).map(|d| (d.year(), d.month(), d.day()))
    }

    #[test]
    fn test_missing_and_blank() {
        assert_eq!(parse_date(None), None);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(Some("   ")), None);
    }

    #[test]
    fn test_canonical_passes_through() {
        let dt = parse_date(Some("2025-01-15T10:00:00Z")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-15T10:00:00+00:00");

        let dt = parse_date(Some("2025-09-20T18:30:00-04:00")).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -4 * 3600);
        assert_eq!(dt.to_rfc3339(), "2025-09-20T18:30:00-04:00");
    }

    #[test]
    fn test_naive_values_are_utc() {
        let dt = parse_date(Some("2025-10-01 09:00")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-10-01T09:00:00+00:00");
        let dt = parse_date(Some("2025-10-01")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-10-01T00:00:00+00:00");
    }

    #[test]
    fn test_month_name_formats() {
        assert_eq!(ymd("Jan 15, 2025"), Some((2025, 1, 15)));
        assert_eq!(ymd("January 15, 2025"), Some((2025, 1, 15)));
        assert_eq!(ymd("15 March 2025"), Some((2025, 3, 15)));
        assert_eq!(ymd("Tuesday, March 4th 2025 at 6pm"), Some((2025, 3, 4)));
        assert_eq!(ymd("Sept. 9-11, 2025 (Austin, TX)"), Some((2025, 9, 9)));
        assert_eq!(ymd("the 3rd of June, 2026"), Some((2026, 6, 3)));
    }

    #[test]
    fn test_missing_year_uses_reference_year() {
        assert_eq!(ymd("Keynote on Nov 12"), Some((2025, 11, 12)));
    }

    #[test]
    fn test_embedded_iso_in_text() {
        assert_eq!(ymd("Starts 2025-11-02T09:00:00Z, doors open early"), Some((2025, 11, 2)));
    }

    #[test]
    fn test_numeric_fallback_priority() {
        assert_eq!(ymd("2025/7/4"), Some((2025, 7, 4)));
        // US wins over European for slash dates
        assert_eq!(ymd("03/04/2025"), Some((2025, 3, 4)));
        assert_eq!(ymd("31.12.2025"), Some((2025, 12, 31)));
        // Invalid US reading falls through to nothing, slashes are never European
        assert_eq!(ymd("25/12/2025"), None);
    }

    #[test]
    fn test_two_digit_years() {
        assert_eq!(ymd("12/01/49"), Some((2049, 12, 1)));
        assert_eq!(ymd("12/01/50"), Some((1950, 12, 1)));
        assert_eq!(ymd("01.02.25"), Some((2025, 2, 1)));
    }

    #[test]
    fn test_unparseable_is_none() {
        assert_eq!(ymd("next spring"), None);
        assert_eq!(ymd("TBA"), None);
        assert_eq!(ymd("N/A"), None);
        assert_eq!(ymd("February 30, 2025"), None);
    }
}
