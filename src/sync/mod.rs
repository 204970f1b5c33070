//! Cloud side of the tracker. The remote store keeps one blob per device. On startup the remote
//! copy is merged into local state once ([reconciler::CloudReconciler::initial_load]), afterwards
//! local changes are pushed after a quiet period.

use std::{collections::HashSet, fmt::Display, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::entities::{AppState, LogEntry};

pub mod device;
pub mod reconciler;
pub mod rest;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TABLE: &str = "time_tracker_data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the latest change before state is pushed.
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// What the remote store keeps for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudRecord {
    pub device_id: Arc<str>,
    pub data: Arc<AppState>,
    pub updated_at: DateTime<Utc>,
}

/// Remote key-value store addressed by device identity. Writes are upserts, so the last write
/// wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudStore: Send + Sync {
    /// `Ok(None)` when the device has never synced.
    async fn fetch(&self, device_id: &str) -> Result<Option<AppState>>;

    async fn upsert(&self, record: CloudRecord) -> Result<()>;
}

/// Concatenates local and remote logs, keeping the first occurrence of every id, newest first.
pub fn merge_logs(local: &[LogEntry], remote: &[LogEntry]) -> Vec<LogEntry> {
    let mut seen = HashSet::<&str>::new();
    let mut merged = local
        .iter()
        .chain(remote)
        .filter(|v| seen.insert(&*v.id))
        .cloned()
        .collect::<Vec<_>>();
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged
}

/// The remote copy wins for categories and settings, logs are unioned.
pub fn merge_states(local: &AppState, remote: AppState) -> AppState {
    let logs = merge_logs(&local.logs, &remote.logs);
    AppState {
        logs,
        categories: remote.categories,
        settings: remote.settings.sanitized(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, TimeZone, Utc};

    use crate::state::entities::{AppState, LogEntry, Settings};

    use super::{merge_logs, merge_states};

    fn log(id: &str, minutes: i64) -> LogEntry {
        let now = Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        LogEntry {
            id: id.into(),
            ..LogEntry::new("Work".into(), now, Duration::hours(1))
        }
    }

    #[test]
    fn test_merge_shared_log_once() {
        let local = [log("a", 0), log("b", 10)];
        let remote = [log("b", 10), log("c", 20)];

        let merged = merge_logs(&local, &remote);
        let ids = merged.iter().map(|v| &*v.id).collect::<Vec<_>>();
        assert_eq!(ids, ["c", "b", "a"]);
    }

    #[test]
    fn test_merge_keeps_local_copy_of_duplicate() {
        let local = [LogEntry {
            category: "Local".into(),
            ..log("a", 0)
        }];
        let remote = [LogEntry {
            category: "Remote".into(),
            ..log("a", 0)
        }];
        let merged = merge_logs(&local, &remote);
        assert_eq!(merged.len(), 1);
        assert_eq!(&*merged[0].category, "Local");
    }

    #[test]
    fn test_merge_sizes() {
        let local = (0..6).map(|i| log(&format!("id-{i}"), i)).collect::<Vec<_>>();
        let remote = (4..10).map(|i| log(&format!("id-{i}"), i)).collect::<Vec<_>>();

        let merged = merge_logs(&local, &remote);
        assert_eq!(merged.len(), local.len() + remote.len() - 2);
        let unique = merged.iter().map(|v| v.id.clone()).collect::<HashSet<_>>();
        assert_eq!(unique.len(), merged.len());
        assert!(merged.windows(2).all(|v| v[0].timestamp >= v[1].timestamp));
    }

    #[test]
    fn test_merge_states_remote_wins_for_settings() {
        let local = AppState {
            logs: vec![log("a", 0)],
            ..Default::default()
        };
        let remote = AppState {
            logs: vec![log("b", 5)],
            categories: vec![],
            settings: Settings {
                interval_hours: 3.,
                ..Default::default()
            },
        };

        let merged = merge_states(&local, remote);
        assert_eq!(merged.settings.interval_hours, 3.);
        assert!(merged.categories.is_empty());
        assert_eq!(merged.logs.len(), 2);
    }

    #[test]
    fn test_merge_states_resets_oversized_remote_interval() {
        let remote = AppState {
            settings: Settings {
                interval_hours: 1e10,
                last_check_in_time: Some(Utc.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap()),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge_states(&AppState::default(), remote);
        assert_eq!(merged.settings.interval_hours, 1.);
        assert_eq!(merged.settings.interval(), Duration::hours(1));
    }
}
