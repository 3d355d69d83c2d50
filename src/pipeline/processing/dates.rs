//! Date normalization for the many textual date shapes the event sites use.
//!
//! Everything here is pure: no clock reads, no logging, no panics.

use crate::types::DateOrder;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static BRACKET_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[[^\]]*\]\s*$").unwrap());
static ISO_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2})?").unwrap());
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)(?:day|sday|nesday|rsday|urday)?\b\.?,?\s*")
        .unwrap()
});
static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").unwrap());
static SEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsept\b").unwrap());
static ABBREV_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z]{3,})\.").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4})$").unwrap());
static DAY_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s*[-–—]\s*\d{1,2}\s+([A-Za-z]+)\.?,?\s+(\d{4})").unwrap());

static RANGE_FULL_BOTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}\s+[A-Za-z]+\.?,?\s+\d{4})\s*[-–—]\s*(\d{1,2}\s+[A-Za-z]+\.?,?\s+\d{4})").unwrap()
});
static RANGE_CROSS_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s+([A-Za-z]+)\.?\s*[-–—]\s*(\d{1,2})\s+([A-Za-z]+)\.?,?\s+(\d{4})").unwrap()
});
static RANGE_SAME_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\s*[-–—]\s*(\d{1,2})\s+([A-Za-z]+)\.?,?\s+(\d{4})").unwrap());
static RANGE_US_CROSS_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z]+)\.?\s+(\d{1,2})\s*[-–—]\s*([A-Za-z]+)\.?\s+(\d{1,2}),?\s+(\d{4})").unwrap()
});
static RANGE_US_SAME_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z]+)\.?\s+(\d{1,2})\s*[-–—]\s*(\d{1,2}),?\s+(\d{4})").unwrap());

const MIN_YEAR: i32 = 2000;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

const NAIVE_ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const CALENDAR_DATETIME_FORMATS: &[&str] = &[
    "%d %B %Y %H:%M",
    "%B %d %Y %H:%M",
    "%d %B %Y %I:%M %p",
    "%B %d %Y %I:%M %p",
    "%d %B %Y %I:%M%p",
    "%B %d %Y %I:%M%p",
    "%B %d %Y %I %p",
    "%d %B %Y %I %p",
];

const CALENDAR_DATE_FORMATS: &[&str] = &["%d %B %Y", "%B %d %Y", "%Y %B %d"];

/// Parse with the month-first convention for numeric dates.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_date_with(raw, DateOrder::MonthFirst)
}

/// Parse a scraped date string into a UTC instant, or `None`.
///
/// Tries, in order: ISO-8601, calendar strings with month names (year must
/// be after 2000), numeric dates in the given `order`, and `D - D Month Year`
/// ranges (first day wins). Naive times are taken as UTC.
pub fn parse_date_with(raw: &str, order: DateOrder) -> Option<DateTime<Utc>> {
    let stripped = BRACKET_SUFFIX.replace(raw.trim(), "");
    let text = stripped.trim();
    if text.is_empty() {
        return None;
    }

    if ISO_PREFIX.is_match(text) {
        if let Some(dt) = parse_iso(text) {
            return Some(dt);
        }
    }

    if let Some(dt) = parse_calendar(text) {
        return Some(dt);
    }

    if let Some(dt) = parse_numeric(text, order) {
        return Some(dt);
    }

    parse_day_range(text)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt))
}

fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let zoned = match text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
        Some(rest) => format!("{rest}+00:00"),
        None => text.to_string(),
    };
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_ISO_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    // Date part alone when the time portion is something unusual.
    text.get(..10)
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .and_then(midnight)
}

/// Month-name shapes: "18 Feb 2026", "Thursday, February 19th, 2026 6:00 PM".
fn parse_calendar(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        let dt = dt.with_timezone(&Utc);
        return (dt.year() > MIN_YEAR).then_some(dt);
    }

    let cleaned = clean_calendar_text(text);
    for fmt in CALENDAR_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            if ndt.year() > MIN_YEAR {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }
    for fmt in CALENDAR_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            if date.year() > MIN_YEAR {
                return midnight(date);
            }
        }
    }
    None
}

fn clean_calendar_text(text: &str) -> String {
    let s = WEEKDAY.replace_all(text, "");
    let s = ORDINAL.replace_all(&s, "$1");
    let s = SEPT.replace_all(&s, "Sep");
    let s = ABBREV_DOT.replace_all(&s, "$1");
    let s = s.replace(',', " ").replace(" at ", " ");
    SPACES.replace_all(s.trim(), " ").into_owned()
}

fn parse_numeric(text: &str, order: DateOrder) -> Option<DateTime<Utc>> {
    let caps = NUMERIC.captures(text)?;
    let a: u32 = caps[1].parse().ok()?;
    let b: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;

    let (month, day) = match order {
        DateOrder::MonthFirst if a > 12 && b <= 12 => (b, a),
        DateOrder::MonthFirst => (a, b),
        DateOrder::DayFirst if b > 12 && a <= 12 => (a, b),
        DateOrder::DayFirst => (b, a),
    };
    NaiveDate::from_ymd_opt(year, month, day).and_then(midnight)
}

fn parse_day_range(text: &str) -> Option<DateTime<Utc>> {
    let caps = DAY_RANGE.captures(text)?;
    let first = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&first, "%d %B %Y").ok().and_then(midnight)
}

/// Split a date range into its two single-date bounds.
///
/// Handles "19 Feb - 20 Mar 2026", "4 - 5 Feb 2026", "April 9–11, 2026",
/// "March 30 - April 1, 2026" and fully-qualified "1 Dec 2025 - 3 Jan 2026".
/// Each bound can then be fed to [`parse_date_with`].
pub fn split_range(text: &str) -> Option<(String, String)> {
    let text = SPACES.replace_all(text.trim(), " ");

    if let Some(c) = RANGE_FULL_BOTH.captures(&text) {
        return Some((c[1].to_string(), c[2].to_string()));
    }
    if let Some(c) = RANGE_CROSS_MONTH.captures(&text) {
        return Some((
            format!("{} {} {}", &c[1], &c[2], &c[5]),
            format!("{} {} {}", &c[3], &c[4], &c[5]),
        ));
    }
    if let Some(c) = RANGE_SAME_MONTH.captures(&text) {
        return Some((
            format!("{} {} {}", &c[1], &c[3], &c[4]),
            format!("{} {} {}", &c[2], &c[3], &c[4]),
        ));
    }
    if let Some(c) = RANGE_US_CROSS_MONTH.captures(&text) {
        return Some((
            format!("{} {}, {}", &c[1], &c[2], &c[5]),
            format!("{} {}, {}", &c[3], &c[4], &c[5]),
        ));
    }
    if let Some(c) = RANGE_US_SAME_MONTH.captures(&text) {
        return Some((
            format!("{} {}, {}", &c[1], &c[2], &c[4]),
            format!("{} {}, {}", &c[1], &c[3], &c[4]),
        ));
    }
    None
}

/// Parse either a single date or a range, returning `(start, end)`.
pub fn parse_span(text: &str, order: DateOrder) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match split_range(text) {
        Some((start, end)) => (parse_date_with(&start, order), parse_date_with(&end, order)),
        None => (parse_date_with(text, order), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iso(dt: Option<DateTime<Utc>>) -> Option<String> {
        dt.map(|d| crate::types::iso_millis::format(&d))
    }

    #[test]
    fn parses_day_month_year() {
        assert_eq!(iso(parse_date("18 Feb 2026")).as_deref(), Some("2026-02-18T00:00:00.000Z"));
        assert_eq!(iso(parse_date("18 February 2026")).as_deref(), Some("2026-02-18T00:00:00.000Z"));
    }

    #[test]
    fn parses_iso_variants() {
        assert_eq!(
            iso(parse_date("2026-02-19T20:15:00.000Z")).as_deref(),
            Some("2026-02-19T20:15:00.000Z")
        );
        assert_eq!(
            iso(parse_date("2026-02-19T20:15+04:00")).as_deref(),
            Some("2026-02-19T16:15:00.000Z")
        );
        assert_eq!(iso(parse_date("2026-03-01")).as_deref(), Some("2026-03-01T00:00:00.000Z"));
        assert_eq!(
            iso(parse_date("2026-03-01T09:30")).as_deref(),
            Some("2026-03-01T09:30:00.000Z")
        );
    }

    #[test]
    fn iso_round_trips() {
        for s in ["2026-05-04T10:11:12.345Z", "2027-12-31T23:59:59.000Z"] {
            assert_eq!(iso(parse_date(s)).as_deref(), Some(s));
        }
    }

    #[test]
    fn strips_bracketed_zone_suffix() {
        assert_eq!(
            iso(parse_date("2026-02-19T18:00:00+04:00[Asia/Dubai]")).as_deref(),
            Some("2026-02-19T14:00:00.000Z")
        );
    }

    #[test]
    fn parses_weekday_and_ordinal_forms() {
        assert_eq!(
            iso(parse_date("Thursday, February 19th, 2026")).as_deref(),
            Some("2026-02-19T00:00:00.000Z")
        );
        assert_eq!(
            iso(parse_date("Sat, Mar 7, 2026 6:30 PM")).as_deref(),
            Some("2026-03-07T18:30:00.000Z")
        );
        assert_eq!(iso(parse_date("Sept 5, 2026")).as_deref(), Some("2026-09-05T00:00:00.000Z"));
    }

    #[test]
    fn rejects_old_years() {
        assert_eq!(parse_date("18 Feb 1999"), None);
    }

    #[test]
    fn numeric_order_is_per_site() {
        assert_eq!(
            iso(parse_date_with("03/04/2026", DateOrder::MonthFirst)).as_deref(),
            Some("2026-03-04T00:00:00.000Z")
        );
        assert_eq!(
            iso(parse_date_with("03/04/2026", DateOrder::DayFirst)).as_deref(),
            Some("2026-04-03T00:00:00.000Z")
        );
        // 25 cannot be a month, so either convention lands on the same day.
        assert_eq!(
            iso(parse_date_with("25.12.2026", DateOrder::MonthFirst)).as_deref(),
            Some("2026-12-25T00:00:00.000Z")
        );
    }

    #[test]
    fn day_range_takes_first_day() {
        assert_eq!(iso(parse_date("4 - 5 Feb 2026")).as_deref(), Some("2026-02-04T00:00:00.000Z"));
        assert_eq!(iso(parse_date("19–21 March 2026")).as_deref(), Some("2026-03-19T00:00:00.000Z"));
    }

    #[test]
    fn garbage_is_none() {
        for s in ["", "   ", "TBD", "not a date", "next Tuesday-ish", "2026", "32/13/2026"] {
            assert_eq!(parse_date(s), None, "{s:?}");
        }
    }

    #[test]
    fn splits_range_shapes() {
        assert_eq!(
            split_range("19 Feb - 20 Mar 2026"),
            Some(("19 Feb 2026".into(), "20 Mar 2026".into()))
        );
        assert_eq!(
            split_range("4 - 5 Feb 2026"),
            Some(("4 Feb 2026".into(), "5 Feb 2026".into()))
        );
        assert_eq!(
            split_range("April 9–11, 2026"),
            Some(("April 9, 2026".into(), "April 11, 2026".into()))
        );
        assert_eq!(
            split_range("March 30 - April 1, 2026"),
            Some(("March 30, 2026".into(), "April 1, 2026".into()))
        );
        assert_eq!(split_range("4 Feb 2026"), None);
    }

    #[test]
    fn span_parses_both_bounds() {
        let (start, end) = parse_span("April 9–11, 2026", DateOrder::MonthFirst);
        assert_eq!(iso(start).as_deref(), Some("2026-04-09T00:00:00.000Z"));
        assert_eq!(iso(end).as_deref(), Some("2026-04-11T00:00:00.000Z"));

        let (start, end) = parse_span("4 Feb 2026", DateOrder::DayFirst);
        assert!(start.is_some());
        assert!(end.is_none());
    }
}
