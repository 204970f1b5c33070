//! Periodic activity check-ins. Every interval the user is asked what they just did, the answer
//! labels the elapsed period, and the logged time can later be summarized per category.
//!
//! [app::AppContext] is the entry point: it owns the [state::store::StateStore], keeps it in line
//! with the cloud copy through [sync::reconciler::CloudReconciler] and arms reminders through
//! [reminder::ReminderScheduler].

pub mod app;
pub mod cli;
pub mod insights;
pub mod reminder;
pub mod state;
pub mod sync;
pub mod utils;
