//! Attempt-date parsing and display.
//!
//! Backends report attempt dates in several encodings, including a
//! `YYYY-MM-DDTHH.MM.SS` variant with dotted time separators. Every consumer goes
//! through [`AttemptDate::resolve`], which tries a fixed chain of strategies and
//! degrades to "unparseable" instead of failing.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::model::UNKNOWN_DATE_DISPLAY;
use crate::time::DisplayZone;

/// `DD-MM-YYYY, hh:mm AM`
const DISPLAY_FORMAT: &str = "%d-%m-%Y, %I:%M %p";

/// Offset-less layouts interpreted as wall-clock time in the display zone.
const LOCAL_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

static DOTTED_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([T ]\d{2})\.(\d{2})\.(\d{2})").expect("dotted time pattern is valid")
});

/// Rewrite a dotted time-of-day (`T14.30.00`) to colon form (`T14:30:00`).
///
/// Only the first time-of-day portion is touched; dotted dates are left alone.
#[must_use]
pub fn normalize_time_separators(raw: &str) -> Cow<'_, str> {
    DOTTED_TIME.replace(raw, "$1:$2:$3")
}

/// Parse an attempt date, trying in order:
///
/// 1. the string as-is after time-separator normalization (RFC 3339, RFC 2822,
///    offset-less date-times in `zone`, bare dates as UTC midnight);
/// 2. the same string with a UTC designator appended;
/// 3. manual `YYYY-MM-DDTHH:MM:SS` decomposition into wall-clock components in `zone`.
///
/// Returns `None` when every strategy fails.
#[must_use]
pub fn parse_attempt_date(raw: &str, zone: DisplayZone) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = normalize_time_separators(trimmed);
    parse_direct(&normalized, zone)
        .or_else(|| parse_as_utc(&normalized))
        .or_else(|| parse_components(&normalized, zone))
}

fn parse_direct(value: &str, zone: DisplayZone) -> Option<DateTime<FixedOffset>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant);
    }
    if let Ok(instant) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(instant);
    }
    if let Ok(instant) = DateTime::parse_from_rfc2822(value) {
        return Some(instant);
    }

    if let Some(naive) = LOCAL_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
    {
        return zone.resolve_local(naive);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc().fixed_offset())
}

fn parse_as_utc(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(&format!("{value}Z")).ok()
}

fn parse_components(value: &str, zone: DisplayZone) -> Option<DateTime<FixedOffset>> {
    let (date_part, time_part) = value.split_once('T')?;

    let mut date = date_part.split('-').map(str::trim);
    let year: i32 = date.next()?.parse().ok()?;
    let month: u32 = date.next()?.parse().ok()?;
    let day: u32 = date.next()?.parse().ok()?;

    let mut time = time_part.split(':').map(str::trim);
    let hour: u32 = time.next()?.parse().ok()?;
    let minute: u32 = time.next()?.parse().ok()?;
    let second: f64 = time.next()?.parse().ok()?;
    if !second.is_finite() || second < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let second = second.trunc() as u32;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    zone.resolve_local(naive)
}

/// Render an instant as `DD-MM-YYYY, hh:mm AM/PM` in the display zone.
#[must_use]
pub fn format_attempt_date(instant: &DateTime<FixedOffset>, zone: DisplayZone) -> String {
    zone.wall_clock(instant).format(DISPLAY_FORMAT).to_string()
}

/// Resolved attempt date: epoch milliseconds plus display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptDate {
    pub timestamp_millis: i64,
    pub display: String,
}

impl AttemptDate {
    /// Placeholder for a missing or unparseable date.
    #[must_use]
    pub fn unparseable() -> Self {
        Self {
            timestamp_millis: 0,
            display: UNKNOWN_DATE_DISPLAY.to_string(),
        }
    }

    /// Resolve a raw date string, degrading to [`AttemptDate::unparseable`].
    #[must_use]
    pub fn resolve(raw: Option<&str>, zone: DisplayZone) -> Self {
        raw.and_then(|raw| parse_attempt_date(raw, zone))
            .map_or_else(Self::unparseable, |instant| Self {
                timestamp_millis: instant.timestamp_millis(),
                display: format_attempt_date(&instant, zone),
            })
    }
}
