// src/ingest/dates.rs
//! Publish-date resolution for feed items.
//!
//! Order: every configured field with the strict RFC 3339 / RFC 2822 parsers first,
//! then the same fields again with a permissive parser. No date, no entry.

use crate::ingest::syndication::FeedItem;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

const OFFSET_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];

const ZONE_NAMES: &[(&str, &str)] = &[
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("UT", "+0000"),
    ("Z", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
];

fn from_offset(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

/// RFC 3339 or RFC 2822, nothing else.
pub fn parse_strict(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    OffsetDateTime::parse(s, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc2822))
        .ok()
        .and_then(from_offset)
}

fn numeric_zone(s: &str) -> String {
    if let Some((head, last)) = s.rsplit_once(' ') {
        if let Some((_, off)) = ZONE_NAMES.iter().find(|(name, _)| *name == last) {
            return format!("{head} {off}");
        }
    }
    if let Some(head) = s.strip_suffix('Z') {
        return format!("{head}+0000");
    }
    s.to_string()
}

/// Best-effort parse of the date spellings found in the wild. Well-formed RFC 3339 / 2822
/// values belong to [`parse_strict`]; this pass only sees what it rejected.
pub fn parse_permissive(s: &str) -> Option<DateTime<Utc>> {
    let raw = s.trim();
    if raw.is_empty() {
        return None;
    }
    let zoned = numeric_zone(raw);
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

pub fn resolve_published(item: &FeedItem, date_fields: &[String]) -> Option<DateTime<Utc>> {
    let values: Vec<&str> = date_fields.iter().filter_map(|f| item.text(f)).collect();
    values
        .iter()
        .find_map(|v| parse_strict(v))
        .or_else(|| values.iter().find_map(|v| parse_permissive(v)))
}
