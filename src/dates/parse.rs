//! Individual date parsers, one per strategy.
//!
//! Each parser returns the instant it found in UTC or a [`ParseFailure`]. The
//! caller is responsible for running [`check_plausible`] on the result.

use crate::error::ParseFailure;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

/// Earliest publication year we accept.
pub const MIN_YEAR: i32 = 1990;

/// Candidates within this many milliseconds of the evaluation instant are
/// treated as upstream "fallback to now" values.
pub const NOW_GUARD_MS: i64 = 5_000;

/// Free-text parsing is never attempted on anything longer than this.
pub const FREE_TEXT_MAX_CHARS: usize = 64;

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

static URL_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})(?:/|$)").unwrap());
static URL_DASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|/)(\d{4})-(\d{1,2})-(\d{1,2})(?:[-/_.]|$)").unwrap());
static URL_YM: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d{4})/(\d{1,2})(?:/|$)").unwrap());

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})[a-z]*\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .unwrap()
});
static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})[a-z]*\.?,?\s+(\d{{4}})\b"
    ))
    .unwrap()
});
static NUMERIC_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})[/.-](\d{1,2})[/.-](\d{1,2})\b").unwrap());
static NUMERIC_SLASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static NUMERIC_DOTTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b").unwrap());

/// Strict parse of machine-readable timestamps.
///
/// Accepts RFC 3339, ISO-8601 with or without an offset (naive values are
/// taken as UTC), bare `YYYY-MM-DD` (midnight UTC) and RFC 2822 as used by
/// RSS and Atom feeds.
pub fn parse_structured(raw: &str) -> Result<DateTime<Utc>, ParseFailure> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(midnight(date));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(ParseFailure::Unrecognized(s.to_string()))
}

/// Date encoded in a URL path: `/YYYY/MM/DD/`, a `YYYY-MM-DD-slug` segment,
/// or `/YYYY/MM/` (first of the month).
pub fn parse_url_path(url: &str) -> Result<DateTime<Utc>, ParseFailure> {
    // Only the path counts; hosts and query strings carry unrelated numbers.
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or(url).to_string());

    for re in [&*URL_YMD, &*URL_DASHED] {
        if let Some(date) = re.captures(&path).and_then(|c| numeric_date(&c, 1, 2, 3)) {
            return Ok(midnight(date));
        }
    }
    if let Some(c) = URL_YM.captures(&path) {
        let year = c[1].parse().ok();
        let month = c[2].parse().ok();
        if let Some(date) = year
            .zip(month)
            .and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1))
        {
            return Ok(midnight(date));
        }
    }

    Err(ParseFailure::Unrecognized(url.to_string()))
}

/// Fuzzy parse of human-written dates in a short string.
///
/// Recognizes `May 13, 2024`, `13 May 2024`, `2024/05/13`, `05/13/2024`
/// (US order, falling back to day-first when the month would be invalid)
/// and `13.05.2024`.
pub fn parse_free_text(raw: &str) -> Result<DateTime<Utc>, ParseFailure> {
    let s = raw.trim();
    let len = s.chars().count();
    if len > FREE_TEXT_MAX_CHARS {
        return Err(ParseFailure::TooLong(len));
    }

    if let Some(c) = MONTH_DAY_YEAR.captures(s) {
        if let Some(date) = named_month_date(&c[3], &c[1], &c[2]) {
            return Ok(midnight(date));
        }
    }
    if let Some(c) = DAY_MONTH_YEAR.captures(s) {
        if let Some(date) = named_month_date(&c[3], &c[2], &c[1]) {
            return Ok(midnight(date));
        }
    }
    if let Some(date) = NUMERIC_YMD.captures(s).and_then(|c| numeric_date(&c, 1, 2, 3)) {
        return Ok(midnight(date));
    }
    if let Some(c) = NUMERIC_SLASHED.captures(s) {
        if let Some(date) = numeric_date(&c, 3, 1, 2).or_else(|| numeric_date(&c, 3, 2, 1)) {
            return Ok(midnight(date));
        }
    }
    if let Some(date) = NUMERIC_DOTTED.captures(s).and_then(|c| numeric_date(&c, 3, 2, 1)) {
        return Ok(midnight(date));
    }

    Err(ParseFailure::Unrecognized(s.to_string()))
}

/// Reject instants that cannot be real publication dates and drop
/// sub-second precision so the canonical string round-trips.
pub fn check_plausible(
    t: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ParseFailure> {
    let max = now.year() + 1;
    if t.year() < MIN_YEAR || t.year() > max {
        return Err(ParseFailure::ImplausibleYear {
            year: t.year(),
            min: MIN_YEAR,
            max,
        });
    }
    if (t - now).num_milliseconds().abs() <= NOW_GUARD_MS {
        return Err(ParseFailure::ResolvesToNow);
    }
    Ok(t.with_nanosecond(0).unwrap_or(t))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn numeric_date(c: &Captures<'_>, y: usize, m: usize, d: usize) -> Option<NaiveDate> {
    let year = c.get(y)?.as_str().parse().ok()?;
    let month = c.get(m)?.as_str().parse().ok()?;
    let day = c.get(d)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn named_month_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let prefix = month.get(..3)?.to_ascii_lowercase();
    let month = MONTHS.split('|').position(|m| m == prefix)? as u32 + 1;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_structured_rfc3339_with_offset() {
        assert_eq!(
            parse_structured("2024-05-13T12:30:00+02:00").unwrap(),
            utc(2024, 5, 13, 10, 30, 0)
        );
        assert_eq!(
            parse_structured("2025-07-12T13:20:40Z").unwrap(),
            utc(2025, 7, 12, 13, 20, 40)
        );
    }

    #[test]
    fn test_structured_naive_is_utc() {
        assert_eq!(
            parse_structured("2024-05-13T10:30:00").unwrap(),
            utc(2024, 5, 13, 10, 30, 0)
        );
        assert_eq!(
            parse_structured("2024-05-13 10:30").unwrap(),
            utc(2024, 5, 13, 10, 30, 0)
        );
    }

    #[test]
    fn test_structured_bare_date_is_midnight() {
        assert_eq!(parse_structured("2024-05-13").unwrap(), utc(2024, 5, 13, 0, 0, 0));
    }

    #[test]
    fn test_structured_rfc2822() {
        assert_eq!(
            parse_structured("Mon, 13 May 2024 10:30:00 +0000").unwrap(),
            utc(2024, 5, 13, 10, 30, 0)
        );
    }

    #[test]
    fn test_structured_rejects_prose() {
        assert!(parse_structured("last Tuesday").is_err());
        assert!(parse_structured("").is_err());
        assert!(parse_structured("2024-13-45").is_err());
    }

    #[test]
    fn test_url_path_patterns() {
        assert_eq!(
            parse_url_path("https://openai.com/blog/2024/05/13/gpt-4o").unwrap(),
            utc(2024, 5, 13, 0, 0, 0)
        );
        assert_eq!(
            parse_url_path("https://example.com/posts/2024-03-15-agents-are-here").unwrap(),
            utc(2024, 3, 15, 0, 0, 0)
        );
        assert_eq!(
            parse_url_path("https://ai.meta.com/blog/2024/02/").unwrap(),
            utc(2024, 2, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_url_path_ignores_query_and_plain_urls() {
        assert!(parse_url_path("https://github.com/openai/whisper").is_err());
        assert!(parse_url_path("https://example.com/search?d=/2024/05/13/").is_err());
        assert!(parse_url_path("https://arxiv.org/abs/2405.12345v1").is_err());
    }

    #[test]
    fn test_free_text_month_names() {
        let expected = utc(2024, 5, 13, 0, 0, 0);
        assert_eq!(parse_free_text("May 13, 2024").unwrap(), expected);
        assert_eq!(parse_free_text("Published 13 May 2024").unwrap(), expected);
        assert_eq!(parse_free_text("Sept. 5th 2024").unwrap(), utc(2024, 9, 5, 0, 0, 0));
        assert_eq!(parse_free_text("january 2, 2025").unwrap(), utc(2025, 1, 2, 0, 0, 0));
    }

    #[test]
    fn test_free_text_numeric() {
        let expected = utc(2024, 5, 13, 0, 0, 0);
        assert_eq!(parse_free_text("05/13/2024").unwrap(), expected);
        assert_eq!(parse_free_text("13/05/2024").unwrap(), expected);
        assert_eq!(parse_free_text("13.05.2024").unwrap(), expected);
        assert_eq!(parse_free_text("2024/05/13").unwrap(), expected);
    }

    #[test]
    fn test_free_text_bounds_length() {
        let long = format!("{} May 13, 2024", "word ".repeat(20));
        assert!(matches!(parse_free_text(&long), Err(ParseFailure::TooLong(_))));
    }

    #[test]
    fn test_check_plausible_year_range() {
        let now = utc(2025, 6, 1, 12, 0, 0);
        assert!(check_plausible(utc(1989, 12, 31, 0, 0, 0), now).is_err());
        assert!(check_plausible(utc(2027, 1, 1, 0, 0, 0), now).is_err());
        assert!(check_plausible(utc(2026, 12, 31, 0, 0, 0), now).is_ok());
        assert!(check_plausible(utc(1990, 1, 1, 0, 0, 0), now).is_ok());
    }

    #[test]
    fn test_check_plausible_rejects_now() {
        let now = utc(2025, 6, 1, 12, 0, 0);
        assert_eq!(check_plausible(now, now), Err(ParseFailure::ResolvesToNow));
        let almost = now - chrono::Duration::seconds(3);
        assert_eq!(check_plausible(almost, now), Err(ParseFailure::ResolvesToNow));
        let earlier = now - chrono::Duration::seconds(60);
        assert_eq!(check_plausible(earlier, now), Ok(earlier));
    }

    #[test]
    fn test_check_plausible_truncates_subseconds() {
        let now = utc(2025, 6, 1, 12, 0, 0);
        let t = parse_structured("2024-05-13T10:30:00.987Z").unwrap();
        assert_eq!(check_plausible(t, now).unwrap(), utc(2024, 5, 13, 10, 30, 0));
    }
}
