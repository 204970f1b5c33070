use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    insights::{summarize_day, DaySummary},
    reminder::{NotificationService, ReminderScheduler},
    state::{
        entities::{AppState, Category, CheckInStatus, LogEntry},
        preferences::Preferences,
        settings::{SettingsError, SettingsPatch},
        storage::KeyValueStore,
        store::StateStore,
    },
    sync::{
        device::device_identity, reconciler::CloudReconciler, CloudStore, SyncConfig, SyncStatus,
    },
    utils::clock::Clock,
};

/// Owns the state store, the cloud reconciler and the reminder scheduler of one session. Every
/// mutation goes through here so the scheduler always sees the settings it was changed with.
pub struct AppContext {
    store: StateStore,
    reconciler: Arc<CloudReconciler>,
    scheduler: ReminderScheduler,
    storage: Arc<dyn KeyValueStore>,
    preferences: Preferences,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    push_worker: Option<JoinHandle<()>>,
}

impl AppContext {
    /// Loads local state and merges the cloud copy before returning, so no mutation can race the
    /// initial load. Never fails: every collaborator degrades to local-only operation.
    pub async fn start(
        storage: Arc<dyn KeyValueStore>,
        cloud: Option<Arc<dyn CloudStore>>,
        notifier: Box<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let (device_id, cloud) = match device_identity(storage.as_ref()) {
            Ok(v) => (v, cloud),
            Err(e) => {
                // An identity that isn't stored would orphan the cloud copy on every start.
                error!("Failed to resolve device identity, sync disabled {e:?}");
                (Uuid::new_v4().to_string().into(), None)
            }
        };

        let mut store = StateStore::load(storage.clone(), clock.clone());
        let changes = store.subscribe();
        let reconciler = Arc::new(CloudReconciler::new(cloud, device_id, clock.clone(), config));
        reconciler.initial_load(&mut store).await;

        let shutdown = CancellationToken::new();
        let push_worker = reconciler.spawn_push_worker(changes, shutdown.clone());

        let preferences = Preferences::load(storage.as_ref());
        let mut scheduler =
            ReminderScheduler::new(notifier, clock.clone(), preferences.permission());
        scheduler.rearm(&store.state().settings);

        Self {
            store,
            reconciler,
            scheduler,
            storage,
            preferences,
            clock,
            shutdown,
            push_worker,
        }
    }

    pub fn state(&self) -> &AppState {
        self.store.state()
    }

    pub fn device_id(&self) -> &str {
        self.reconciler.device_id()
    }

    pub fn add_log(&mut self, category: &str) -> LogEntry {
        let entry = self.store.add_log(category);
        self.scheduler.sync_with(&self.store.state().settings);
        entry
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<(), SettingsError> {
        self.store.update_settings(patch)?;
        self.scheduler.sync_with(&self.store.state().settings);
        Ok(())
    }

    pub fn sorted_categories(&self) -> Vec<Category> {
        self.store.sorted_categories()
    }

    pub fn check_in_status(&self) -> CheckInStatus {
        self.store.check_in_status()
    }

    /// Current calendar day on the user's wall clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.local_time().date_naive()
    }

    pub fn insights(&self, day: NaiveDate) -> DaySummary {
        let state = self.store.state();
        summarize_day(
            &state.logs,
            &state.categories,
            day,
            &self.clock.local_time().timezone(),
        )
    }

    pub fn sync_status(&self) -> SyncStatus {
        *self.reconciler.status().borrow()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Delay the pending reminder was armed with.
    pub fn armed_reminder(&self) -> Option<Duration> {
        self.scheduler.armed()
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) -> Result<()> {
        self.preferences
            .set_notifications_enabled(self.storage.as_ref(), enabled)?;
        self.scheduler
            .set_permission(self.preferences.permission(), &self.store.state().settings);
        Ok(())
    }

    pub fn set_hour_excluded(&mut self, hour: u8, excluded: bool) -> Result<()> {
        self.preferences
            .set_hour_excluded(self.storage.as_ref(), hour, excluded)
    }

    /// Picks up what other processes wrote to local storage and re-arms the reminder if needed.
    /// Returns whether the state changed.
    pub fn reload_local(&mut self) -> bool {
        let changed = self.store.reload();

        let preferences = Preferences::load(self.storage.as_ref());
        if preferences != self.preferences {
            debug!("Preferences changed on disk");
            self.preferences = preferences;
            self.scheduler
                .set_permission(self.preferences.permission(), &self.store.state().settings);
        }

        self.scheduler.sync_with(&self.store.state().settings);
        changed
    }

    /// Cancels the pending reminder and flushes a pending cloud push.
    pub async fn shutdown(mut self) {
        self.scheduler.cancel();
        self.shutdown.cancel();
        if let Some(worker) = self.push_worker.take() {
            if let Err(e) = worker.await {
                error!("Cloud push worker failed {e:?}");
            }
        }
        info!("Session closed");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use tempfile::tempdir;

    use crate::{
        reminder::MockNotificationService,
        state::{
            entities::{AppState, LogEntry},
            settings::SettingsPatch,
            storage::{memory::MemoryStore, FileStore, KeyValueStore},
        },
        sync::{CloudRecord, CloudStore, MockCloudStore, SyncConfig, SyncStatus},
        utils::{clock::test_clock::TestClock, logging::TEST_LOGGING},
    };

    use super::AppContext;

    fn quiet_notifier() -> Box<MockNotificationService> {
        let mut notifier = MockNotificationService::new();
        notifier.expect_cancel().returning(|| ());
        notifier.expect_schedule().never();
        Box::new(notifier)
    }

    async fn start(
        storage: Arc<dyn KeyValueStore>,
        cloud: Option<MockCloudStore>,
        notifier: Box<MockNotificationService>,
    ) -> AppContext {
        AppContext::start(
            storage,
            cloud.map(|v| Arc::new(v) as Arc<dyn CloudStore>),
            notifier,
            Arc::new(TestClock::at_hour(12, 0)),
            SyncConfig::default(),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_only_session() {
        *TEST_LOGGING;
        let mut app = start(Arc::new(MemoryStore::default()), None, quiet_notifier()).await;
        assert!(app.check_in_status().is_due);

        app.add_log("Work");
        assert!(!app.check_in_status().is_due);
        assert_eq!(app.sync_status(), SyncStatus::Idle);
        assert_eq!(app.insights(app.today()).check_ins, 1);
        app.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_survives_restart() -> Result<()> {
        let dir = tempdir()?;
        let storage = Arc::new(FileStore::new(dir.path().to_path_buf())?);

        let mut app = start(storage.clone(), None, quiet_notifier()).await;
        let device = app.device_id().to_string();
        app.add_log("Cooking");
        app.update_settings(SettingsPatch {
            interval_hours: Some(2.),
            ..Default::default()
        })?;
        app.shutdown().await;

        let app = start(storage, None, quiet_notifier()).await;
        assert_eq!(app.device_id(), device);
        assert_eq!(app.state().logs.len(), 1);
        assert_eq!(app.state().settings.interval_hours, 2.);
        assert_eq!(&*app.sorted_categories()[0].name, "Cooking");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_merged_and_new_state_is_flushed_on_shutdown() {
        let remote_log = LogEntry::new(
            "Study".into(),
            chrono::Utc::now() - chrono::Duration::days(1),
            chrono::Duration::hours(1),
        );
        let remote = AppState {
            logs: vec![remote_log.clone()],
            ..Default::default()
        };
        let pushed = Arc::new(Mutex::new(Vec::<CloudRecord>::new()));
        let sink = pushed.clone();
        let mut cloud = MockCloudStore::new();
        cloud
            .expect_fetch()
            .times(1)
            .returning(move |_| Ok(Some(remote.clone())));
        cloud.expect_upsert().returning(move |record| {
            sink.lock().unwrap().push(record);
            Ok(())
        });

        let mut app = start(Arc::new(MemoryStore::default()), Some(cloud), quiet_notifier()).await;
        assert_eq!(app.state().logs, [remote_log]);

        app.add_log("Work");
        app.shutdown().await;

        let pushed = pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].data.logs.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_cloud_keeps_working_locally() {
        let mut cloud = MockCloudStore::new();
        cloud
            .expect_fetch()
            .returning(|_| Err(anyhow!("connection refused")));
        cloud
            .expect_upsert()
            .returning(|_| Err(anyhow!("connection refused")));

        let mut app = start(Arc::new(MemoryStore::default()), Some(cloud), quiet_notifier()).await;
        app.add_log("Work");
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(app.sync_status(), SyncStatus::Error);
        assert_eq!(app.state().logs.len(), 1);
        app.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstored_identity_disables_sync() {
        let mut cloud = MockCloudStore::new();
        cloud.expect_fetch().never();
        cloud.expect_upsert().never();
        let storage = Arc::new(MemoryStore {
            failing: true,
            ..Default::default()
        });

        let mut app = start(storage, Some(cloud), quiet_notifier()).await;
        app.add_log("Work");
        app.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabling_notifications_arms_reminder() -> Result<()> {
        let mut notifier = MockNotificationService::new();
        notifier.expect_cancel().returning(|| ());
        notifier
            .expect_schedule()
            .withf(|delay, _| *delay == Duration::from_secs(3600))
            .times(2)
            .returning(|_, _| ());

        let mut app = start(Arc::new(MemoryStore::default()), None, Box::new(notifier)).await;
        assert_eq!(app.armed_reminder(), None);

        app.set_notifications_enabled(true)?;
        assert_eq!(app.armed_reminder(), Some(Duration::from_secs(3600)));

        // A check-in restarts the countdown.
        app.add_log("Work");
        assert_eq!(app.armed_reminder(), Some(Duration::from_secs(3600)));

        app.set_hour_excluded(3, true)?;
        assert!(app.preferences().excluded_hours.contains(&3));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_picks_up_other_writers() {
        let storage = Arc::new(MemoryStore::default());
        let mut reader = start(storage.clone(), None, quiet_notifier()).await;
        let mut writer = start(storage, None, quiet_notifier()).await;

        writer.add_log("Work");
        assert!(reader.reload_local());
        assert_eq!(reader.state().logs.len(), 1);
        assert!(!reader.reload_local());
    }
}
