use std::time::Duration;

use anyhow::Result;
use tokio::{select, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{app::AppContext, reminder::NotificationPermission};

/// How often local storage is checked for changes made by other invocations.
const RELOAD_INTERVAL: Duration = Duration::from_secs(5);

/// Keeps the session alive so armed reminders can fire. Runs until Ctrl-C.
pub async fn serve(app: &mut AppContext) -> Result<()> {
    if app.preferences().permission() != NotificationPermission::Granted {
        println!("Notifications are disabled, enable them with `checkin notifications --enable`");
    }
    println!("Waiting for check-ins, press Ctrl-C to stop");

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(detect_shutdown(shutdown.clone()));
    run_reload_loop(app, shutdown, RELOAD_INTERVAL).await;
    signals.abort();
    Ok(())
}

async fn run_reload_loop(app: &mut AppContext, shutdown: CancellationToken, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested");
                return;
            }
            _ = ticker.tick() => {
                if app.reload_local() {
                    info!("State changed on disk, next reminder in {:?}", app.armed_reminder());
                }
            }
        }
    }
}

/// Cancels `cancellation` on Ctrl-C.
async fn detect_shutdown(cancellation: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        cancellation.cancel();
    }
}
