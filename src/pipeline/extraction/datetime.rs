//! Collection timestamp reconstruction.
//!
//! Reports print a civil date and (usually) a wall-clock time with no zone.
//! Both are always authored in the clinic's zone, so they are interpreted in
//! that zone via the IANA rules and emitted as a UTC instant. The host's local
//! zone never enters into it.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use jiff::tz::TimeZone;
use regex::Regex;

use crate::config::{ConfigError, PipelineConfig};

static NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4}|\d{2})$").unwrap());

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2}):(\d{2})(?::(\d{2}))?\s*(?:([ap])\.?\s*m\.?)?$").unwrap()
});

static MILITARY_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{2})(\d{2})\s*(?:hrs?|h)?$").unwrap());

/// Zone labels some reports append to the time; ignored, the zone is fixed.
static ZONE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\b(?:E[SD]T|ET|EASTERN)\s*$").unwrap());

/// A trailing time-of-day inside a combined "date time" string.
static TRAILING_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\d{1,2}:\d{2}(?::\d{2})?(?:\s*[ap]\.?\s*m\.?)?(?:\s*\b(?:E[SD]T|ET))?\s*$",
    )
    .unwrap()
});

const MIN_YEAR: i32 = 1990;
const MAX_YEAR: i32 = 2100;

/// Resolves fragmentary report date/time text to an absolute instant.
#[derive(Debug, Clone)]
pub struct CollectionTimeResolver {
    tz: TimeZone,
}

impl CollectionTimeResolver {
    /// Build a resolver for an IANA zone name.
    pub fn new(zone_name: &str) -> Result<Self, ConfigError> {
        let tz = TimeZone::get(zone_name)
            .map_err(|_| ConfigError::UnknownTimeZone(zone_name.to_string()))?;
        Ok(Self { tz })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Self::new(&config.clinic_timezone)
    }

    pub fn zone_name(&self) -> Option<&str> {
        self.tz.iana_name()
    }

    /// Resolve a civil date and optional time to UTC.
    ///
    /// A missing time means local midnight. Anything malformed, including a
    /// time that is present but unparseable, yields `None`.
    pub fn resolve(&self, date_text: &str, time_text: Option<&str>) -> Option<DateTime<Utc>> {
        let date = parse_civil_date(date_text)?;
        let time = match time_text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => parse_civil_time(t)?,
            None => NaiveTime::MIN,
        };
        self.to_instant(date, time)
    }

    /// Resolve a single "date time" string such as `03/15/2024 2:30 PM`.
    pub fn resolve_combined(&self, text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if let Some(instant) = self.resolve(text, None) {
            return Some(instant);
        }
        let time_match = TRAILING_TIME.find(text)?;
        let date_part = text[..time_match.start()]
            .trim()
            .trim_end_matches(['@', ','])
            .trim_end();
        let date_part = date_part
            .strip_suffix(" at")
            .or_else(|| date_part.strip_suffix('T'))
            .unwrap_or(date_part);
        self.resolve(date_part, Some(time_match.as_str()))
    }

    fn to_instant(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        let civil = jiff::civil::DateTime::new(
            i16::try_from(date.year()).ok()?,
            date.month() as i8,
            date.day() as i8,
            time.hour() as i8,
            time.minute() as i8,
            time.second() as i8,
            0,
        )
        .ok()?;
        // Gaps resolve forward, folds take the earlier offset.
        let zoned = civil.to_zoned(self.tz.clone()).ok()?;
        let ts = zoned.timestamp();
        DateTime::from_timestamp(ts.as_second(), ts.subsec_nanosecond() as u32)
    }
}

/// Parse a report date. Supports `MM/DD/YYYY`, `M/D/YY`, `MM-DD-YYYY`,
/// `YYYY-MM-DD`, `March 15, 2024`, `Mar 15 2024` and `15-Mar-2024`.
pub fn parse_civil_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim().trim_end_matches([',', '.']);
    if trimmed.is_empty() {
        return None;
    }

    let date = if let Some(caps) = ISO_DATE.captures(trimmed) {
        NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    } else if let Some(caps) = NUMERIC_DATE.captures(trimmed) {
        let year: i32 = caps[3].parse().ok()?;
        // Two-digit years on drug screens are always this century.
        let year = if caps[3].len() == 2 { 2000 + year } else { year };
        NaiveDate::from_ymd_opt(year, caps[1].parse().ok()?, caps[2].parse().ok()?)
    } else {
        parse_textual_date(trimmed)
    }?;

    (MIN_YEAR..=MAX_YEAR).contains(&date.year()).then_some(date)
}

fn parse_textual_date(text: &str) -> Option<NaiveDate> {
    let normalized = text.replace('.', "").split_whitespace().collect::<Vec<_>>().join(" ");
    for format in ["%B %d, %Y", "%B %d %Y", "%d-%b-%Y", "%d %B %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(&normalized, format) {
            return Some(d);
        }
    }
    None
}

/// Parse a wall-clock time: `14:30`, `2:30 PM`, `2:30:15 p.m.`, `1430`.
/// A trailing Eastern zone label is tolerated and ignored.
pub fn parse_civil_time(text: &str) -> Option<NaiveTime> {
    let trimmed = ZONE_SUFFIX.replace(text.trim(), "");
    let trimmed = trimmed.trim();

    if let Some(caps) = CLOCK_TIME.captures(trimmed) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        let second: u32 = match caps.get(3) {
            Some(s) => s.as_str().parse().ok()?,
            None => 0,
        };
        let hour = match caps.get(4).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(meridiem) => to_24_hour(hour, meridiem == "p")?,
            None => hour,
        };
        return NaiveTime::from_hms_opt(hour, minute, second);
    }

    if let Some(caps) = MILITARY_TIME.captures(trimmed) {
        return NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0);
    }

    None
}

fn to_24_hour(hour: u32, pm: bool) -> Option<u32> {
    match (hour, pm) {
        (1..=11, false) => Some(hour),
        (12, false) => Some(0),
        (1..=11, true) => Some(hour + 12),
        (12, true) => Some(12),
        _ => None,
    }
}
