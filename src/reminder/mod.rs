//! Reminder scheduling. One logical timer per session: whenever the inputs that decide the next
//! reminder change, the pending one is cancelled and a new one is computed from scratch.

use std::{fmt::Display, sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use tracing::{debug, info, instrument};

use crate::{
    state::entities::Settings,
    utils::{
        clock::Clock,
        time::{is_in_sleep_window, next_sleep_window_end, WallTime},
    },
};

pub mod notifier;

pub const NOTIFICATION_TITLE: &str = "TimeTrack";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPermission {
    /// The user was never asked.
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl Display for NotificationPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationPermission::Unknown => write!(f, "not requested"),
            NotificationPermission::Granted => write!(f, "granted"),
            NotificationPermission::Denied => write!(f, "denied"),
        }
    }
}

/// Platform mechanism that shows a single reminder after a delay. Scheduling again replaces the
/// pending reminder.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationService: Send {
    fn schedule(&mut self, delay: Duration, interval_hours: f64);

    fn cancel(&mut self);
}

/// `What did you do in the last 2 hours?`
pub fn reminder_body(interval_hours: f64) -> String {
    let suffix = if interval_hours > 1. { "s" } else { "" };
    format!("What did you do in the last {interval_hours} hour{suffix}?")
}

/// Time until the next reminder should be shown. Zero means a check-in is already due.
///
/// The result never lands inside the sleep window: a reminder that would fire there is moved to
/// the end of that window.
pub fn compute_delay(settings: &Settings, now: &DateTime<FixedOffset>) -> TimeDelta {
    let interval = settings.interval();
    let mut delay = match settings.last_check_in_time {
        Some(last) => {
            let due = last
                .checked_add_signed(interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            (due - now.with_timezone(&Utc)).max(TimeDelta::zero())
        }
        None => interval,
    };

    if is_in_sleep_window(now, settings.sleep_start, settings.sleep_end) {
        delay = delay.max(next_sleep_window_end(now, settings.sleep_end) - *now);
    }

    match now.checked_add_signed(delay) {
        Some(fires_at) if is_in_sleep_window(&fires_at, settings.sleep_start, settings.sleep_end) => {
            next_sleep_window_end(&fires_at, settings.sleep_end) - *now
        }
        _ => delay,
    }
}

/// The settings that decide when the next reminder fires.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScheduleInputs {
    interval_hours: f64,
    sleep_start: WallTime,
    sleep_end: WallTime,
    last_check_in_time: Option<DateTime<Utc>>,
}

impl From<&Settings> for ScheduleInputs {
    fn from(value: &Settings) -> Self {
        Self {
            interval_hours: value.interval_hours,
            sleep_start: value.sleep_start,
            sleep_end: value.sleep_end,
            last_check_in_time: value.last_check_in_time,
        }
    }
}

pub struct ReminderScheduler {
    notifier: Box<dyn NotificationService>,
    clock: Arc<dyn Clock>,
    permission: NotificationPermission,
    armed: Option<Duration>,
    inputs: Option<ScheduleInputs>,
}

impl ReminderScheduler {
    pub fn new(
        notifier: Box<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        permission: NotificationPermission,
    ) -> Self {
        Self {
            notifier,
            clock,
            permission,
            armed: None,
            inputs: None,
        }
    }

    /// Delay the pending reminder was armed with.
    pub fn armed(&self) -> Option<Duration> {
        self.armed
    }

    pub fn permission(&self) -> NotificationPermission {
        self.permission
    }

    pub fn set_permission(&mut self, permission: NotificationPermission, settings: &Settings) {
        if self.permission == permission {
            return;
        }
        info!("Notification permission is now {permission}");
        self.permission = permission;
        self.rearm(settings);
    }

    /// Re-arms only when something that affects the next reminder changed. Returns whether it did.
    pub fn sync_with(&mut self, settings: &Settings) -> bool {
        if self.inputs == Some(ScheduleInputs::from(settings)) {
            return false;
        }
        self.rearm(settings);
        true
    }

    /// Cancels the pending reminder and arms a fresh one. Nothing is armed without permission or
    /// when a check-in is already due.
    #[instrument(skip_all)]
    pub fn rearm(&mut self, settings: &Settings) {
        self.inputs = Some(ScheduleInputs::from(settings));
        self.cancel();

        if self.permission != NotificationPermission::Granted {
            debug!("Notifications are {}, not arming", self.permission);
            return;
        }

        let delay = compute_delay(settings, &self.clock.local_time())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if delay.is_zero() {
            debug!("Check-in is already due, not arming");
            return;
        }

        info!("Next reminder in {}s", delay.as_secs());
        self.notifier.schedule(delay, settings.interval_hours);
        self.armed = Some(delay);
    }

    pub fn cancel(&mut self) {
        self.notifier.cancel();
        self.armed = None;
    }
}
