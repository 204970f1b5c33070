use std::{fmt::Display, str::FromStr};

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 24 * 60;
const MILLIS_PER_HOUR: f64 = 3_600_000.;

/// Wall-clock time of day with minute precision. Stored and displayed as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallTime {
    hour: u8,
    minute: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a valid HH:MM time")]
pub struct InvalidWallTime(pub String);

impl WallTime {
    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.hour as u32 * 60 + self.minute as u32
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    /// `23:00` becomes `11:00 PM`.
    pub fn to_12h_string(&self) -> String {
        let period = if self.hour >= 12 { "PM" } else { "AM" };
        let hour = match self.hour % 12 {
            0 => 12,
            v => v,
        };
        format!("{hour}:{:02} {period}", self.minute)
    }
}

impl Display for WallTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallTime {
    type Err = InvalidWallTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidWallTime(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        WallTime::new(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for WallTime {
    type Error = InvalidWallTime;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WallTime> for String {
    fn from(value: WallTime) -> Self {
        value.to_string()
    }
}

/// Longest supported check-in interval, one year.
pub const MAX_INTERVAL_HOURS: f64 = 24. * 365.;

/// Length of a check-in period. Fractional hours are kept with millisecond precision, values
/// outside `0..=MAX_INTERVAL_HOURS` are clamped.
pub fn interval_duration(interval_hours: f64) -> Duration {
    let interval_hours = interval_hours.clamp(0., MAX_INTERVAL_HOURS);
    Duration::milliseconds((interval_hours * MILLIS_PER_HOUR).round() as i64)
}

/// Checks whether `now` falls into the daily window `[sleep_start, sleep_end)`. When
/// `sleep_start > sleep_end` the window wraps past midnight. Equal bounds describe an empty window.
pub fn is_in_sleep_window(now: &impl Timelike, sleep_start: WallTime, sleep_end: WallTime) -> bool {
    let current = (now.hour() * 60 + now.minute()) % MINUTES_PER_DAY;
    let start = sleep_start.minutes_since_midnight();
    let end = sleep_end.minutes_since_midnight();

    if start > end {
        current >= start || current < end
    } else {
        current >= start && current < end
    }
}

/// Returns the first instant at or after `now` whose time of day is `sleep_end`.
pub fn next_sleep_window_end<Tz: TimeZone>(now: &DateTime<Tz>, sleep_end: WallTime) -> DateTime<Tz> {
    let timezone = now.timezone();
    let today = now.date_naive().and_time(sleep_end.as_naive_time());
    let candidate = resolve_local(&timezone, today);
    if candidate >= *now {
        candidate
    } else {
        resolve_local(&timezone, today + Duration::days(1))
    }
}

/// Instants at which `day` starts and the following day starts in `timezone`.
pub fn local_day_bounds<Tz: TimeZone>(timezone: &Tz, day: NaiveDate) -> (DateTime<Tz>, DateTime<Tz>) {
    let start = day.and_time(NaiveTime::MIN);
    (
        resolve_local(timezone, start),
        resolve_local(timezone, start + Duration::days(1)),
    )
}

/// Maps a wall-clock value onto the timezone. Ambiguous values pick the earlier instant, values
/// inside a DST gap move forward by the gap.
fn resolve_local<Tz: TimeZone>(timezone: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(v) => v,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => timezone
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| timezone.from_utc_datetime(&naive)),
    }
}

/// Formats a tracked duration the way summaries show it: `2h 5m`, `2h` or `5m`.
pub fn format_duration(v: Duration) -> String {
    let hours = v.num_hours();
    let minutes = v.num_minutes() % 60;
    match (hours, minutes) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Formats the time left until the next check-in: `1h 5m`, `5m 3s` or `3s`.
pub fn format_countdown(v: Duration) -> String {
    let hours = v.num_hours();
    let minutes = v.num_minutes() % 60;
    let seconds = v.num_seconds() % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
