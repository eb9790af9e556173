//! Timestamp normalization for listing and detail pages
//!
//! Listings abbreviate timestamps aggressively: today's items show `hh:mm`,
//! this year's show `mm.dd`, and only older items carry a full date. Short
//! forms are resolved against a caller-supplied reference time, never an
//! ambient clock, so parsing stays deterministic under test.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y.%m.%d", "%Y-%m-%d", "%Y/%m/%d"];

/// Parses a fully qualified timestamp (`yyyy.mm.dd [hh:mm[:ss]]`)
pub fn parse_full_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&datetime));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        }
    }

    None
}

/// Parses a listing timestamp, resolving abbreviated forms against
/// `reference`
///
/// Accepted shapes: a full timestamp, `mm.dd` (reference year), or `hh:mm`
/// (reference date).
pub fn parse_listing_timestamp(text: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(datetime) = parse_full_timestamp(text) {
        return Some(datetime);
    }

    let text = text.trim();

    for (separator, format) in [('.', "%Y.%m.%d"), ('-', "%Y-%m-%d"), ('/', "%Y/%m/%d")] {
        if !text.contains(separator) {
            continue;
        }
        let with_year = format!("{}{}{}", reference.year(), separator, text);
        if let Ok(date) = NaiveDate::parse_from_str(&with_year, format) {
            return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        }
    }

    if let Ok(time) = NaiveTime::parse_from_str(text, "%H:%M") {
        return Some(Utc.from_utc_datetime(&reference.date_naive().and_time(time)));
    }

    None
}
