use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::utils::time::{InvalidWallTime, WallTime, MAX_INTERVAL_HOURS};

use super::entities::{Settings, DEFAULT_INTERVAL_HOURS};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("interval must be a positive number of hours up to {max}, got {0}", max = MAX_INTERVAL_HOURS)]
    InvalidInterval(f64),
    #[error(transparent)]
    InvalidTime(#[from] InvalidWallTime),
}

/// Partial settings update. Only fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub interval_hours: Option<f64>,
    pub sleep_start: Option<WallTime>,
    pub sleep_end: Option<WallTime>,
    /// `Some(None)` clears the last check-in.
    pub last_check_in_time: Option<Option<DateTime<Utc>>>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub fn validate_interval(interval_hours: f64) -> Result<f64, SettingsError> {
    if interval_hours > 0. && interval_hours <= MAX_INTERVAL_HOURS {
        Ok(interval_hours)
    } else {
        Err(SettingsError::InvalidInterval(interval_hours))
    }
}

impl Settings {
    /// Applies the patch field by field. Nothing is changed when validation fails.
    pub fn apply(&mut self, patch: SettingsPatch) -> Result<(), SettingsError> {
        let SettingsPatch {
            interval_hours,
            sleep_start,
            sleep_end,
            last_check_in_time,
        } = patch;

        let interval_hours = interval_hours.map(validate_interval).transpose()?;

        if let Some(v) = interval_hours {
            self.interval_hours = v;
        }
        if let Some(v) = sleep_start {
            self.sleep_start = v;
        }
        if let Some(v) = sleep_end {
            self.sleep_end = v;
        }
        if let Some(v) = last_check_in_time {
            self.last_check_in_time = v;
        }
        Ok(())
    }

    /// Settings coming from disk or from the cloud are not validated on the way in. An unusable
    /// interval falls back to the default instead of discarding the whole state.
    pub fn sanitized(mut self) -> Self {
        if validate_interval(self.interval_hours).is_err() {
            warn!(
                "Stored interval {} is not usable, falling back to {DEFAULT_INTERVAL_HOURS}",
                self.interval_hours
            );
            self.interval_hours = DEFAULT_INTERVAL_HOURS;
        }
        self
    }
}
