use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Timelike;
use notify_rust::Notification;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use crate::{
    state::{preferences::Preferences, storage::KeyValueStore},
    utils::clock::Clock,
};

use super::{reminder_body, NotificationService, NOTIFICATION_TITLE};

/// Notification id reused by every reminder, so a new one replaces the previous.
#[cfg(all(unix, not(target_os = "macos")))]
const REMINDER_ID: u32 = 0x7ec4;

/// Puts a reminder in front of the user. Called from a blocking thread.
pub trait ReminderDisplay: Send + Sync {
    fn show(&self, interval_hours: f64) -> Result<()>;
}

/// Desktop notification through the platform notification server.
pub struct DesktopDisplay;

impl ReminderDisplay for DesktopDisplay {
    fn show(&self, interval_hours: f64) -> Result<()> {
        let mut notification = Notification::new();
        notification
            .summary(NOTIFICATION_TITLE)
            .body(&reminder_body(interval_hours))
            .appname("checkin");
        #[cfg(all(unix, not(target_os = "macos")))]
        notification.id(REMINDER_ID);

        notification
            .show()
            .map(|_| ())
            .context("Notification server rejected the reminder")
    }
}

/// Shows reminders after a delay. The pending reminder lives in a tokio task, so the notifier
/// must be used inside a runtime and only fires while the process is alive.
pub struct DesktopNotifier {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    display: Arc<dyn ReminderDisplay>,
    pending: Option<JoinHandle<()>>,
}

impl DesktopNotifier {
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_display(storage, clock, Arc::new(DesktopDisplay))
    }

    pub fn with_display(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        display: Arc<dyn ReminderDisplay>,
    ) -> Self {
        Self {
            storage,
            clock,
            display,
            pending: None,
        }
    }
}

impl NotificationService for DesktopNotifier {
    fn schedule(&mut self, delay: Duration, interval_hours: f64) {
        self.cancel();

        let storage = self.storage.clone();
        let clock = self.clock.clone();
        let display = self.display.clone();
        let task = async move {
            clock.sleep(delay).await;

            // Excluded hours are read when firing, they may have changed in the meantime.
            let covered_hour = match clock.local_time().hour() {
                0 => 23,
                v => v - 1,
            };
            if Preferences::load(storage.as_ref())
                .excluded_hours
                .contains(&(covered_hour as u8))
            {
                info!("Hour {covered_hour} is excluded, skipping reminder");
                return;
            }

            let shown = tokio::task::spawn_blocking(move || display.show(interval_hours)).await;
            match shown {
                Ok(Ok(())) => info!("Reminder shown"),
                Ok(Err(e)) => error!("Failed to show reminder {e:?}"),
                Err(e) => error!("Reminder task failed {e:?}"),
            }
        };
        self.pending = Some(tokio::spawn(task.instrument(info_span!("reminder"))));
    }

    fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for DesktopNotifier {
    fn drop(&mut self) {
        self.cancel();
    }
}
