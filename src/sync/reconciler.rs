use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::{
    state::{entities::AppState, store::StateStore},
    utils::clock::Clock,
};

use super::{merge_states, CloudRecord, CloudStore, SyncConfig, SyncStatus};

/// Keeps local state and the device's cloud copy in line. Without a configured cloud store every
/// operation is a no-op and the status stays [SyncStatus::Idle].
pub struct CloudReconciler {
    cloud: Option<Arc<dyn CloudStore>>,
    device_id: Arc<str>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    status: watch::Sender<SyncStatus>,
    loaded: AtomicBool,
}

impl CloudReconciler {
    pub fn new(
        cloud: Option<Arc<dyn CloudStore>>,
        device_id: Arc<str>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            cloud,
            device_id,
            clock,
            config,
            status,
            loaded: AtomicBool::new(false),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Merges the cloud copy into `store`. Only the first call per reconciler does anything.
    #[instrument(skip_all, fields(device_id = %self.device_id))]
    pub async fn initial_load(&self, store: &mut StateStore) {
        if self.loaded.swap(true, Ordering::SeqCst) {
            warn!("Initial cloud load was already performed");
            return;
        }
        let Some(cloud) = &self.cloud else {
            debug!("Cloud sync is not configured, staying local");
            return;
        };

        match cloud.fetch(&self.device_id).await {
            Ok(Some(remote)) => {
                info!(
                    "Merging {} remote logs into {} local logs",
                    remote.logs.len(),
                    store.state().logs.len()
                );
                let merged = merge_states(store.state(), remote);
                store.replace(merged);
            }
            Ok(None) => info!("No cloud copy for this device yet"),
            Err(e) => {
                error!("Failed to load from cloud {e:?}");
                self.status.send_replace(SyncStatus::Error);
            }
        }
    }

    /// Starts the task that pushes state after every burst of changes. Returns `None` when there
    /// is nothing to push to.
    ///
    /// Each change restarts the quiet period, so only the latest snapshot of a burst is pushed.
    /// The snapshot is read when the timer fires. Cancelling `shutdown` pushes a pending change
    /// right away and ends the task.
    pub fn spawn_push_worker(
        self: &Arc<Self>,
        changes: watch::Receiver<Arc<AppState>>,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        self.cloud.as_ref()?;
        let reconciler = self.clone();
        Some(tokio::spawn(
            async move { reconciler.run_push_worker(changes, shutdown).await }
                .instrument(info_span!("cloud push worker")),
        ))
    }

    async fn run_push_worker(
        &self,
        mut changes: watch::Receiver<Arc<AppState>>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    if changes.has_changed().unwrap_or(false) {
                        self.push_latest(&mut changes).await;
                    }
                    return;
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        self.push_latest(&mut changes).await;
                        return;
                    }
                    changed = changes.changed() => {
                        if changed.is_err() {
                            self.push_latest(&mut changes).await;
                            return;
                        }
                        debug!("State changed again, restarting quiet period");
                    }
                    _ = self.clock.sleep(self.config.debounce) => break,
                }
            }

            self.push_latest(&mut changes).await;
        }
    }

    async fn push_latest(&self, changes: &mut watch::Receiver<Arc<AppState>>) {
        let snapshot = changes.borrow_and_update().clone();
        self.push(snapshot).await;
    }

    /// Failures only show up in the status and the logs. Local state is never touched.
    pub async fn push(&self, state: Arc<AppState>) {
        let Some(cloud) = &self.cloud else {
            return;
        };

        self.status.send_replace(SyncStatus::Syncing);
        let record = CloudRecord {
            device_id: self.device_id.clone(),
            data: state,
            updated_at: self.clock.time(),
        };
        match cloud.upsert(record).await {
            Ok(()) => {
                info!("Pushed state to cloud");
                self.status.send_replace(SyncStatus::Synced);
            }
            Err(e) => {
                error!("Failed to sync to cloud {e:?}");
                self.status.send_replace(SyncStatus::Error);
            }
        }
    }
}
