use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::time::{interval_duration, WallTime};

/// One completed check-in. The covered period is `[period_start, period_end)` and `period_end`
/// always equals `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: Arc<str>,
    pub category: Arc<str>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub period_start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub period_end: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(category: Arc<str>, now: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4().to_string().into(),
            category,
            timestamp: now,
            period_start: now.checked_sub_signed(interval).unwrap_or(DateTime::<Utc>::MIN_UTC),
            period_end: now,
        }
    }

    pub fn duration(&self) -> Duration {
        self.period_end - self.period_start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: Arc<str>,
    /// Display hint, e.g. `#3b82f6`.
    pub color: Arc<str>,
    pub use_count: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_used: DateTime<Utc>,
    pub is_default: bool,
}

impl Category {
    fn seeded(name: &str, color: &str) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            use_count: 0,
            last_used: DateTime::UNIX_EPOCH,
            is_default: true,
        }
    }
}

pub const DEFAULT_INTERVAL_HOURS: f64 = 1.;

const DEFAULT_SLEEP_START: WallTime = match WallTime::new(23, 0) {
    Some(v) => v,
    None => panic!("23:00 is a valid time"),
};

const DEFAULT_SLEEP_END: WallTime = match WallTime::new(7, 0) {
    Some(v) => v,
    None => panic!("07:00 is a valid time"),
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub interval_hours: f64,
    pub sleep_start: WallTime,
    pub sleep_end: WallTime,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_check_in_time: Option<DateTime<Utc>>,
}

impl Settings {
    pub fn interval(&self) -> Duration {
        interval_duration(self.interval_hours)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_hours: DEFAULT_INTERVAL_HOURS,
            sleep_start: DEFAULT_SLEEP_START,
            sleep_end: DEFAULT_SLEEP_END,
            last_check_in_time: None,
        }
    }
}

/// The aggregate persisted locally and pushed to the cloud as one blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub logs: Vec<LogEntry>,
    pub categories: Vec<Category>,
    pub settings: Settings,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            logs: vec![],
            categories: default_categories(),
            settings: Settings::default(),
        }
    }
}

pub fn default_categories() -> Vec<Category> {
    vec![
        Category::seeded("Work", "#3b82f6"),
        Category::seeded("Study", "#8b5cf6"),
        Category::seeded("Rest", "#10b981"),
        Category::seeded("Social", "#f59e0b"),
        Category::seeded("Exercise", "#ef4444"),
        Category::seeded("Other", "#6b7280"),
    ]
}

/// Colors handed out to categories created on the fly.
pub const FALLBACK_PALETTE: [&str; 8] = [
    "#3b82f6", "#8b5cf6", "#10b981", "#f59e0b", "#ef4444", "#ec4899", "#06b6d4", "#84cc16",
];

/// Result of comparing the last check-in against the configured interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInStatus {
    pub is_due: bool,
    /// Absent until the first check-in.
    pub next_check_in_at: Option<DateTime<Utc>>,
    pub time_until_next: Duration,
}
