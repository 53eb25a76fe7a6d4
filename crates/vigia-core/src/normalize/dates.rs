//! Lenient event-date parsing.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::ops::RangeInclusive;

/// Years that render as a four-digit `YYYY-MM-DD` day.
const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const MONTH_FIRST: &[&str] = &["%m/%d/%Y", "%m/%d/%Y %H:%M:%S%.f", "%m/%d/%Y %H:%M"];
const DAY_FIRST: &[&str] = &["%d/%m/%Y", "%d/%m/%Y %H:%M:%S%.f", "%d/%m/%Y %H:%M"];

/// Parse an event date, discarding any time of day.
///
/// Timestamps with an offset keep the calendar date as written in that
/// offset. Slash dates are month-first unless `day_first` is set. Dates
/// outside years 1 to 9999 are rejected.
#[must_use]
pub fn parse_event_date(raw: &str, day_first: bool) -> Option<NaiveDate> {
    parse_any(raw.trim(), day_first).filter(|date| SUPPORTED_YEARS.contains(&date.year()))
}

fn parse_any(value: &str, day_first: bool) -> Option<NaiveDate> {
    if value.is_empty() {
        return None;
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
    {
        return Some(date);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.date_naive());
    }

    if let Some(ts) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
    {
        return Some(ts.date_naive());
    }

    if let Some(ts) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Some(ts.date());
    }

    let slash_formats = if day_first { DAY_FIRST } else { MONTH_FIRST };
    slash_formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(value, fmt)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(value, fmt).ok().map(|ts| ts.date()))
    })
}

#[cfg(test)]
mod tests {
    use super::parse_event_date;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn iso_date() {
        assert_eq!(parse_event_date("2024-01-31", false), Some(ymd(2024, 1, 31)));
    }

    #[test]
    fn iso_datetime_drops_time() {
        assert_eq!(
            parse_event_date("2024-01-31 23:59:59", false),
            Some(ymd(2024, 1, 31))
        );
        assert_eq!(
            parse_event_date("2024-01-31T08:15:00.123456", false),
            Some(ymd(2024, 1, 31))
        );
        assert_eq!(
            parse_event_date("2024-01-31 08:15", false),
            Some(ymd(2024, 1, 31))
        );
    }

    #[test]
    fn offset_keeps_written_calendar_day() {
        assert_eq!(
            parse_event_date("2024-01-31T23:30:00-03:00", false),
            Some(ymd(2024, 1, 31))
        );
        assert_eq!(
            parse_event_date("2024-01-31 23:30:00-03:00", false),
            Some(ymd(2024, 1, 31))
        );
    }

    #[test]
    fn slash_dates_follow_day_order() {
        assert_eq!(parse_event_date("02/03/2024", false), Some(ymd(2024, 2, 3)));
        assert_eq!(parse_event_date("02/03/2024", true), Some(ymd(2024, 3, 2)));
        assert_eq!(parse_event_date("31/01/2024", false), None);
        assert_eq!(
            parse_event_date("31/01/2024 10:00:00", true),
            Some(ymd(2024, 1, 31))
        );
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(parse_event_date("  2024-05-06 ", false), Some(ymd(2024, 5, 6)));
    }

    #[test]
    fn years_outside_four_digits_are_rejected() {
        for raw in ["+12345-01-01", "-0001-01-01", "0000-01-01", "+10000-12-31T00:00:00"] {
            assert_eq!(parse_event_date(raw, false), None, "{raw:?} should not parse");
        }
        assert_eq!(parse_event_date("0001-01-01", false), Some(ymd(1, 1, 1)));
        assert_eq!(parse_event_date("9999-12-31", false), Some(ymd(9999, 12, 31)));
    }

    #[test]
    fn garbage_is_rejected() {
        for raw in ["", "   ", "ontem", "2024-13-01", "2024-02-30", "nan", "NaT"] {
            assert_eq!(parse_event_date(raw, false), None, "{raw:?} should not parse");
        }
    }
}
