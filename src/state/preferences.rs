use std::collections::BTreeSet;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::reminder::NotificationPermission;

use super::storage::KeyValueStore;

pub const NOTIFICATIONS_KEY: &str = "time-tracker-notifications-enabled";
pub const EXCLUDED_HOURS_KEY: &str = "time-tracker-excluded-hours";

/// Reminder preferences kept under their own keys, next to the main state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    /// `None` until the user made a choice.
    pub notifications_enabled: Option<bool>,
    /// Hours of the day (0-23) for which reminders are not shown.
    pub excluded_hours: BTreeSet<u8>,
}

impl Preferences {
    /// Unreadable values are treated as absent.
    pub fn load(storage: &dyn KeyValueStore) -> Self {
        let notifications_enabled = match storage.get(NOTIFICATIONS_KEY) {
            Ok(Some(v)) => match v.trim() {
                "true" => Some(true),
                "false" => Some(false),
                other => {
                    warn!("Ignoring unexpected notification flag {other:?}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read notification flag {e:?}");
                None
            }
        };

        let excluded_hours = match storage.get(EXCLUDED_HOURS_KEY) {
            Ok(Some(v)) => match serde_json::from_str::<Vec<u8>>(&v) {
                Ok(hours) => hours.into_iter().filter(|v| *v < 24).collect(),
                Err(e) => {
                    warn!("Ignoring malformed excluded hours {v:?}: {e}");
                    BTreeSet::new()
                }
            },
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                warn!("Failed to read excluded hours {e:?}");
                BTreeSet::new()
            }
        };

        Self {
            notifications_enabled,
            excluded_hours,
        }
    }

    pub fn permission(&self) -> NotificationPermission {
        match self.notifications_enabled {
            None => NotificationPermission::Unknown,
            Some(true) => NotificationPermission::Granted,
            Some(false) => NotificationPermission::Denied,
        }
    }

    pub fn set_notifications_enabled(
        &mut self,
        storage: &dyn KeyValueStore,
        enabled: bool,
    ) -> Result<()> {
        storage.set(NOTIFICATIONS_KEY, if enabled { "true" } else { "false" })?;
        self.notifications_enabled = Some(enabled);
        Ok(())
    }

    pub fn set_hour_excluded(
        &mut self,
        storage: &dyn KeyValueStore,
        hour: u8,
        excluded: bool,
    ) -> Result<()> {
        if hour >= 24 {
            return Err(anyhow!("{hour} is not an hour of the day"));
        }
        let mut hours = self.excluded_hours.clone();
        if excluded {
            hours.insert(hour);
        } else {
            hours.remove(&hour);
        }
        storage.set(
            EXCLUDED_HOURS_KEY,
            &serde_json::to_string(&hours.iter().collect::<Vec<_>>())?,
        )?;
        self.excluded_hours = hours;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::{
        reminder::NotificationPermission,
        state::storage::{memory::MemoryStore, KeyValueStore},
    };

    use super::{Preferences, EXCLUDED_HOURS_KEY, NOTIFICATIONS_KEY};

    #[test]
    fn test_first_run_permission_is_unknown() {
        let preferences = Preferences::load(&MemoryStore::default());
        assert_eq!(preferences.permission(), NotificationPermission::Unknown);
        assert!(preferences.excluded_hours.is_empty());
    }

    #[test]
    fn test_round_trip_through_storage() -> Result<()> {
        let storage = MemoryStore::default();
        let mut preferences = Preferences::default();
        preferences.set_notifications_enabled(&storage, true)?;
        preferences.set_hour_excluded(&storage, 3, true)?;
        preferences.set_hour_excluded(&storage, 1, true)?;
        preferences.set_hour_excluded(&storage, 3, false)?;

        assert_eq!(storage.get(NOTIFICATIONS_KEY)?.as_deref(), Some("true"));
        assert_eq!(storage.get(EXCLUDED_HOURS_KEY)?.as_deref(), Some("[1]"));

        let loaded = Preferences::load(&storage);
        assert_eq!(loaded, preferences);
        assert_eq!(loaded.permission(), NotificationPermission::Granted);
        Ok(())
    }

    #[test]
    fn test_malformed_values_are_ignored() {
        let storage = MemoryStore::with(EXCLUDED_HOURS_KEY, "[1, 2");
        storage.set(NOTIFICATIONS_KEY, "maybe").unwrap();
        let preferences = Preferences::load(&storage);
        assert_eq!(preferences, Preferences::default());
    }

    #[test]
    fn test_rejects_out_of_range_hour() {
        let storage = MemoryStore::default();
        let mut preferences = Preferences::default();
        assert!(preferences.set_hour_excluded(&storage, 24, true).is_err());
        assert_eq!(storage.get(EXCLUDED_HOURS_KEY).unwrap(), None);
    }
}
