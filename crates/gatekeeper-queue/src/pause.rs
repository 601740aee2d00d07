//! Pause specifications and their resolution to absolute instants.
//!
//! A pause tells the queue when the *next* command may run. It is either a
//! span measured from the moment the previous command finished, an absolute
//! instant, or a textual form that is parsed lazily when the queue drains.
//!
//! Recognized textual forms:
//!
//! - bare integer milliseconds: `"1500"`
//! - compact units, combinable: `"500ms"`, `"5s"`, `"2m"`, `"1h 30m"`, `"1d"`
//! - ISO-8601 durations: `"PT5S"`, `"PT1M30S"`, `"P1DT2H"`, `"P1W"`
//! - RFC 3339 instants: `"2026-01-01T08:00:00Z"`
//! - time of day (UTC, on the base date): `"08:30"`, `"08:30:15"`

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};

use crate::error::PauseError;

const SECS_PER_MINUTE: f64 = 60.0;
const SECS_PER_HOUR: f64 = 3_600.0;
const SECS_PER_DAY: f64 = 86_400.0;

/// When the next command may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pause {
    /// A span measured from the resolution base.
    Delay(Duration),
    /// An absolute instant.
    At(DateTime<Utc>),
    /// A time of day (UTC) on the resolution base's date.
    TimeOfDay(NaiveTime),
    /// An unparsed textual specification.
    Text(String),
}

impl Pause {
    /// A pause of zero length.
    pub fn none() -> Self {
        Pause::Delay(Duration::ZERO)
    }

    /// Parse a textual specification into a structured pause.
    pub fn parse(text: &str) -> Result<Pause, PauseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PauseError::Empty);
        }
        if text.starts_with('-') {
            return Err(PauseError::Negative(text.to_string()));
        }

        if text.bytes().all(|b| b.is_ascii_digit()) {
            let millis: u64 = text
                .parse()
                .map_err(|_| PauseError::OutOfRange(text.to_string()))?;
            return Ok(Pause::Delay(Duration::from_millis(millis)));
        }

        if text.starts_with(['P', 'p']) {
            return parse_iso_duration(text).map(Pause::Delay);
        }

        if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            return Ok(Pause::At(at.with_timezone(&Utc)));
        }

        if let Some(time) = parse_time_of_day(text) {
            return Ok(Pause::TimeOfDay(time));
        }

        parse_compact_duration(text).map(Pause::Delay)
    }

    /// Resolve to an absolute instant, treating relative forms as offsets
    /// from `base`.
    pub fn resolve(&self, base: DateTime<Utc>) -> Result<DateTime<Utc>, PauseError> {
        match self {
            Pause::Delay(delay) => offset(base, *delay),
            Pause::At(at) => Ok(*at),
            Pause::TimeOfDay(time) => Ok(base.date_naive().and_time(*time).and_utc()),
            Pause::Text(text) => Pause::parse(text)?.resolve(base),
        }
    }

    /// Whether this pause names an absolute instant rather than a span.
    ///
    /// Unparsed text reports `false` until it is parsed.
    pub fn is_absolute(&self) -> bool {
        matches!(self, Pause::At(_) | Pause::TimeOfDay(_))
    }
}

impl Default for Pause {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Pause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pause::Delay(delay) => write!(f, "{delay:?}"),
            Pause::At(at) => write!(f, "{}", at.to_rfc3339()),
            Pause::TimeOfDay(time) => write!(f, "{}", time.format("%H:%M:%S")),
            Pause::Text(text) => f.write_str(text),
        }
    }
}

impl From<Duration> for Pause {
    fn from(delay: Duration) -> Self {
        Pause::Delay(delay)
    }
}

impl From<DateTime<Utc>> for Pause {
    fn from(at: DateTime<Utc>) -> Self {
        Pause::At(at)
    }
}

impl From<NaiveTime> for Pause {
    fn from(time: NaiveTime) -> Self {
        Pause::TimeOfDay(time)
    }
}

impl From<&str> for Pause {
    fn from(text: &str) -> Self {
        Pause::Text(text.to_string())
    }
}

impl From<String> for Pause {
    fn from(text: String) -> Self {
        Pause::Text(text)
    }
}

/// Offset `base` by `delay`.
pub fn offset(base: DateTime<Utc>, delay: Duration) -> Result<DateTime<Utc>, PauseError> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| base.checked_add_signed(delta))
        .ok_or_else(|| PauseError::OutOfRange(format!("{delay:?}")))
}

fn parse_time_of_day(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

fn parse_compact_duration(text: &str) -> Result<Duration, PauseError> {
    let unrecognized = || PauseError::Unrecognized(text.to_string());
    let terms = split_terms(text).ok_or_else(unrecognized)?;

    let mut total = 0.0;
    for (value, unit) in terms {
        total += match unit.to_ascii_lowercase().as_str() {
            "ms" | "msec" | "millis" | "milliseconds" => value / 1000.0,
            "s" | "sec" | "secs" | "second" | "seconds" => value,
            "m" | "min" | "mins" | "minute" | "minutes" => value * SECS_PER_MINUTE,
            "h" | "hr" | "hrs" | "hour" | "hours" => value * SECS_PER_HOUR,
            "d" | "day" | "days" => value * SECS_PER_DAY,
            _ => return Err(unrecognized()),
        };
    }

    to_duration(total, text)
}

fn parse_iso_duration(text: &str) -> Result<Duration, PauseError> {
    let unrecognized = || PauseError::Unrecognized(text.to_string());
    let upper = text.to_ascii_uppercase();
    let body = &upper[1..];

    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, Some(time)),
        Some(_) => return Err(unrecognized()),
        None => (body, None),
    };

    let mut total = 0.0;
    let mut components = 0;

    for (value, unit) in split_terms(date_part).ok_or_else(unrecognized)? {
        total += value
            * match unit {
                "W" => 7.0 * SECS_PER_DAY,
                "D" => SECS_PER_DAY,
                // Years and months have no fixed length.
                _ => return Err(unrecognized()),
            };
        components += 1;
    }

    if let Some(time_part) = time_part {
        for (value, unit) in split_terms(time_part).ok_or_else(unrecognized)? {
            total += value
                * match unit {
                    "H" => SECS_PER_HOUR,
                    "M" => SECS_PER_MINUTE,
                    "S" => 1.0,
                    _ => return Err(unrecognized()),
                };
            components += 1;
        }
    }

    if components == 0 {
        return Err(unrecognized());
    }
    to_duration(total, text)
}

/// Split `"1h 30m"` style input into `(value, unit)` pairs.
fn split_terms(text: &str) -> Option<Vec<(f64, &str)>> {
    let mut terms = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number.parse().ok()?;

        let tail = tail.trim_start();
        let unit_len = tail
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(tail.len());
        if unit_len == 0 {
            return None;
        }
        let (unit, tail) = tail.split_at(unit_len);

        terms.push((value, unit));
        rest = tail.trim_start();
    }

    Some(terms)
}

fn to_duration(secs: f64, text: &str) -> Result<Duration, PauseError> {
    Duration::try_from_secs_f64(secs).map_err(|_| PauseError::OutOfRange(text.to_string()))
}

#[cfg(test)]
#[path = "pause_tests.rs"]
mod tests;
