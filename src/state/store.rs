use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::utils::clock::Clock;

use super::{
    entities::{AppState, Category, CheckInStatus, LogEntry, FALLBACK_PALETTE},
    settings::{SettingsError, SettingsPatch},
    storage::KeyValueStore,
};

pub const STATE_KEY: &str = "time-tracker-data";

/// Owns the canonical [AppState]. Every mutation is written to local storage before it is
/// published to subscribers, so anything reading a published snapshot sees persisted data.
pub struct StateStore {
    state: AppState,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    changes: watch::Sender<Arc<AppState>>,
}

impl StateStore {
    /// Never fails. Missing, unreadable or corrupted data falls back to the defaults.
    pub fn load(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let state = read_state(storage.as_ref()).unwrap_or_else(|| {
            info!("Starting with default state");
            AppState::default()
        });
        let (changes, _) = watch::channel(Arc::new(state.clone()));
        Self {
            state,
            storage,
            clock,
            changes,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Snapshots published after every mutation. The receiver starts with the current state
    /// marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.changes.subscribe()
    }

    /// Records a check-in covering the last interval and bumps the matching category, creating it
    /// if the name hasn't been seen before.
    #[instrument(skip(self))]
    pub fn add_log(&mut self, category: &str) -> LogEntry {
        let now = self.clock.time();
        let entry = LogEntry::new(category.into(), now, self.state.settings.interval());
        self.state.logs.push(entry.clone());

        match self
            .state
            .categories
            .iter_mut()
            .find(|v| &*v.name == category)
        {
            Some(existing) => {
                existing.use_count += 1;
                existing.last_used = now;
            }
            None => {
                let color = FALLBACK_PALETTE
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(FALLBACK_PALETTE[0]);
                info!("Creating category {category} with color {color}");
                self.state.categories.push(Category {
                    name: entry.category.clone(),
                    color: color.into(),
                    use_count: 1,
                    last_used: now,
                    is_default: false,
                });
            }
        }

        self.state.settings.last_check_in_time = Some(now);
        self.commit();
        entry
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<(), SettingsError> {
        if patch.is_empty() {
            return Ok(());
        }
        debug!("Updating settings {patch:?}");
        self.state.settings.apply(patch)?;
        self.commit();
        Ok(())
    }

    /// Most used first, ties broken by most recent use. Equal keys keep their stored order.
    pub fn sorted_categories(&self) -> Vec<Category> {
        let mut categories = self.state.categories.clone();
        categories.sort_by(|a, b| {
            b.use_count
                .cmp(&a.use_count)
                .then_with(|| b.last_used.cmp(&a.last_used))
        });
        categories
    }

    pub fn check_in_status(&self) -> CheckInStatus {
        let Some(last_check_in) = self.state.settings.last_check_in_time else {
            return CheckInStatus {
                is_due: true,
                next_check_in_at: None,
                time_until_next: Duration::zero(),
            };
        };

        let next_check_in_at = last_check_in
            .checked_add_signed(self.state.settings.interval())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let time_until_next = (next_check_in_at - self.clock.time()).max(Duration::zero());

        CheckInStatus {
            is_due: time_until_next <= Duration::zero(),
            next_check_in_at: Some(next_check_in_at),
            time_until_next,
        }
    }

    /// Swaps the whole state, e.g. after merging with the cloud copy.
    pub fn replace(&mut self, state: AppState) {
        self.state = state;
        self.commit();
    }

    /// Picks up changes another process wrote to local storage. The snapshot held by subscribers is
    /// refreshed without flagging a change, since the data is already persisted by its writer.
    pub fn reload(&mut self) -> bool {
        let Some(stored) = read_state(self.storage.as_ref()) else {
            return false;
        };
        if stored == self.state {
            return false;
        }
        debug!("Reloaded state from local storage");
        self.state = stored;
        let snapshot = Arc::new(self.state.clone());
        self.changes.send_if_modified(|current| {
            *current = snapshot;
            false
        });
        true
    }

    fn commit(&mut self) {
        match serde_json::to_string(&self.state) {
            Ok(serialized) => {
                if let Err(e) = self.storage.set(STATE_KEY, &serialized) {
                    error!("Failed to persist state, keeping it in memory {e:?}");
                }
            }
            Err(e) => error!("Failed to serialize state {e:?}"),
        }
        self.changes.send_replace(Arc::new(self.state.clone()));
    }
}

fn read_state(storage: &dyn KeyValueStore) -> Option<AppState> {
    let stored = match storage.get(STATE_KEY) {
        Ok(v) => v?,
        Err(e) => {
            error!("Failed to read stored state {e:?}");
            return None;
        }
    };
    match serde_json::from_str::<AppState>(&stored) {
        Ok(mut state) => {
            state.settings = state.settings.sanitized();
            Some(state)
        }
        Err(e) => {
            error!("Stored state is corrupted, ignoring it: {e}");
            None
        }
    }
}
