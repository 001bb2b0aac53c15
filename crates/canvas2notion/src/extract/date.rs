//! Natural-language date parsing anchored to a configured time zone.
//!
//! Canvas renders dates for humans ("Sep 20 at 11:59pm", "Not available until
//! Sep 13 at 12am"). This module turns that text into absolute instants.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

const MONTH_PATTERN: &str = r"(?P<month>jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \b(?:
            (?P<hour>\d{1,2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?(?:\s*(?P<meridiem>[ap])\.?m\b\.?)?
          | (?P<bare_hour>\d{1,2})\s*(?P<bare_meridiem>[ap])\.?m\b\.?
          | (?P<word>noon|midnight)\b
        )",
    )
    .unwrap()
});
static MONTH_DAY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b{MONTH_PATTERN}\b\.?\s+(?P<day>\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(?P<year>\d{{4}})\b)?"
    ))
    .unwrap()
});
static DAY_MONTH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?P<day>\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH_PATTERN}\b\.?(?:,?\s+(?P<year>\d{{4}})\b)?"
    ))
    .unwrap()
});
static ISO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})(?:[t\s](?P<hour>\d{2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?)?",
    )
    .unwrap()
});
static SLASH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<month>\d{1,2})/(?P<day>\d{1,2})(?:/(?P<year>\d{4}|\d{2}))?\b").unwrap()
});
static RELATIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \b(?:
            in\s+(?P<n>\d+|an?|one)\s+(?P<unit>minute|min|hour|hr|day|week)s?
          | (?P<ago_n>\d+|an?|one)\s+(?P<ago_unit>minute|min|hour|hr|day|week)s?\s+ago
        )\b",
    )
    .unwrap()
});
static CASUAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?P<word>now|today|tomorrow|yesterday)\b").unwrap());

/// Converts loose date text into instants for one run.
///
/// `now` is captured once at run start so that every record in the run is
/// judged against the same reference point.
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    timezone: Tz,
    now: DateTime<Utc>,
}

impl DateNormalizer {
    pub fn new(timezone: Tz, now: DateTime<Utc>) -> Self {
        Self { timezone, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Parses `text` into an absolute instant, or `None` if no date is recognized.
    ///
    /// A missing year means the current year in the configured zone, and a date
    /// without a time means noon.
    pub fn normalize(&self, text: &str) -> Option<DateTime<Utc>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Ok(exact) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(exact.with_timezone(&Utc));
        }

        let lower = trimmed.to_lowercase();
        let parsed = self
            .parse_relative(&lower)
            .or_else(|| self.parse_calendar(&lower))
            .or_else(|| self.parse_casual(&lower))
            .or_else(|| self.parse_time_only(&lower));

        debug!(text = %trimmed, parsed = ?parsed, "Normalized date text");
        parsed
    }

    /// The run's reference instant rounded up to the next whole hour.
    pub fn next_round_hour(&self) -> DateTime<Utc> {
        next_round_hour(self.now.with_timezone(&self.timezone)).with_timezone(&Utc)
    }

    fn local_now(&self) -> DateTime<Tz> {
        self.now.with_timezone(&self.timezone)
    }

    fn parse_relative(&self, text: &str) -> Option<DateTime<Utc>> {
        let caps = RELATIVE_REGEX.captures(text)?;
        let (count, unit, sign) = match caps.name("n") {
            Some(n) => (n.as_str(), caps.name("unit")?.as_str(), 1),
            None => (caps.name("ago_n")?.as_str(), caps.name("ago_unit")?.as_str(), -1),
        };

        let count: i64 = match count {
            "a" | "an" | "one" => 1,
            digits => digits.parse().ok()?,
        };
        let count = count.checked_mul(sign)?;

        // Out-of-range offsets are treated as unrecognized text
        let offset = match unit {
            "minute" | "min" => Duration::try_minutes(count),
            "hour" | "hr" => Duration::try_hours(count),
            "day" => Duration::try_days(count),
            _ => Duration::try_weeks(count),
        }?;

        self.now.checked_add_signed(offset)
    }

    fn parse_calendar(&self, text: &str) -> Option<DateTime<Utc>> {
        if let Some(caps) = ISO_REGEX.captures(text) {
            let date = NaiveDate::from_ymd_opt(
                capture_number(&caps, "year")? as i32,
                capture_number(&caps, "month")?,
                capture_number(&caps, "day")?,
            )?;
            let whole = caps.get(0)?;
            let time = match caps.name("hour") {
                Some(_) => NaiveTime::from_hms_opt(
                    capture_number(&caps, "hour")?,
                    capture_number(&caps, "minute")?,
                    caps.name("second").map_or(Some(0), |s| s.as_str().parse().ok())?,
                )?,
                None => find_time(text, whole.start(), whole.end()).unwrap_or(noon()),
            };
            return self.localize(date, time);
        }

        let (date, start, end) = self
            .match_named_month(&MONTH_DAY_REGEX, text)
            .or_else(|| self.match_named_month(&DAY_MONTH_REGEX, text))
            .or_else(|| self.match_slash(text))?;

        let time = find_time(text, start, end).unwrap_or(noon());
        self.localize(date, time)
    }

    fn match_named_month(&self, regex: &Regex, text: &str) -> Option<(NaiveDate, usize, usize)> {
        let caps = regex.captures(text)?;
        let whole = caps.get(0)?;
        let month = month_from_name(caps.name("month")?.as_str())?;
        let day = capture_number(&caps, "day")?;
        let year = match caps.name("year") {
            Some(y) => y.as_str().parse().ok()?,
            None => self.local_now().year(),
        };

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some((date, whole.start(), whole.end()))
    }

    fn match_slash(&self, text: &str) -> Option<(NaiveDate, usize, usize)> {
        let caps = SLASH_REGEX.captures(text)?;
        let whole = caps.get(0)?;
        let year = match caps.name("year") {
            Some(y) if y.as_str().len() == 2 => 2000 + y.as_str().parse::<i32>().ok()?,
            Some(y) => y.as_str().parse().ok()?,
            None => self.local_now().year(),
        };

        let date = NaiveDate::from_ymd_opt(
            year,
            capture_number(&caps, "month")?,
            capture_number(&caps, "day")?,
        )?;
        Some((date, whole.start(), whole.end()))
    }

    fn parse_casual(&self, text: &str) -> Option<DateTime<Utc>> {
        let caps = CASUAL_REGEX.captures(text)?;
        let whole = caps.get(0)?;
        let today = self.local_now().date_naive();

        let date = match whole.as_str() {
            "now" => return Some(self.now),
            "tomorrow" => today.succ_opt()?,
            "yesterday" => today.pred_opt()?,
            _ => today,
        };

        match find_time(text, whole.start(), whole.end()) {
            Some(time) => self.localize(date, time),
            None => self.localize(date, self.local_now().time()),
        }
    }

    fn parse_time_only(&self, text: &str) -> Option<DateTime<Utc>> {
        let time = find_time(text, 0, 0)?;
        self.localize(self.local_now().date_naive(), time)
    }

    /// Pins a wall-clock reading to the configured zone.
    ///
    /// Ambiguous readings take the earlier instant; readings inside a DST gap
    /// are pushed forward by an hour.
    fn localize(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        let naive = date.and_time(time);
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()
            })
            .map(|local| local.with_timezone(&Utc))
    }
}

/// Returns `instant` unchanged if it sits on minute zero, otherwise the start
/// of the following hour with seconds and sub-seconds cleared.
pub fn next_round_hour<T: TimeZone>(instant: DateTime<T>) -> DateTime<T> {
    if instant.minute() == 0 {
        return instant;
    }

    let into_hour = Duration::minutes(i64::from(instant.minute()))
        + Duration::seconds(i64::from(instant.second()))
        + Duration::nanoseconds(i64::from(instant.nanosecond()));

    instant - into_hour + Duration::hours(1)
}

/// Formats an instant the way it is persisted: UTC, millisecond precision, `Z` suffix.
pub fn to_iso_string(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

fn capture_number(caps: &Captures, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
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

/// Finds a time of day after `end`, falling back to text before `start`.
fn find_time(text: &str, start: usize, end: usize) -> Option<NaiveTime> {
    TIME_REGEX
        .captures(&text[end..])
        .and_then(|caps| time_from_captures(&caps))
        .or_else(|| {
            TIME_REGEX
                .captures(&text[..start])
                .and_then(|caps| time_from_captures(&caps))
        })
}

fn time_from_captures(caps: &Captures) -> Option<NaiveTime> {
    if let Some(word) = caps.name("word") {
        let hour = if word.as_str() == "noon" { 12 } else { 0 };
        return NaiveTime::from_hms_opt(hour, 0, 0);
    }

    let (hour, minute, second, meridiem) = match caps.name("hour") {
        Some(_) => (
            capture_number(caps, "hour")?,
            capture_number(caps, "minute")?,
            caps.name("second").map_or(Some(0), |s| s.as_str().parse().ok())?,
            caps.name("meridiem"),
        ),
        None => (
            capture_number(caps, "bare_hour")?,
            0,
            0,
            caps.name("bare_meridiem"),
        ),
    };

    let hour = match meridiem.map(|m| m.as_str()) {
        Some("a") if (1..=12).contains(&hour) => hour % 12,
        Some("p") if (1..=12).contains(&hour) => hour % 12 + 12,
        Some(_) => return None,
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, second)
}
