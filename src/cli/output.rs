use std::time::Duration;

use ansi_term::{Colour, Style};
use chrono::{DateTime, Local, TimeDelta, Utc};

use crate::{
    app::AppContext,
    insights::DaySummary,
    state::{
        entities::{Category, LogEntry, Settings},
        preferences::Preferences,
    },
    utils::time::{format_countdown, format_duration},
};

/// Parses `#rrggbb` display hints. Anything else prints uncoloured.
pub fn category_colour(hex: &str) -> Option<Colour> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Colour::RGB(channel(0)?, channel(2)?, channel(4)?))
}

fn swatch(hex: &str) -> String {
    match category_colour(hex) {
        Some(colour) => colour.paint("●").to_string(),
        None => "●".to_string(),
    }
}

fn local_clock(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%H:%M").to_string()
}

pub fn print_status(app: &AppContext) {
    let status = app.check_in_status();
    let bold = Style::new().bold();
    match status.next_check_in_at {
        _ if status.is_due => println!("{}", bold.paint("Check-in is due. What did you do?")),
        Some(next) => println!(
            "Next check-in in {} (at {})",
            bold.paint(format_countdown(status.time_until_next)),
            local_clock(next)
        ),
        None => println!("No check-in yet"),
    }

    if let Some(last) = app.state().settings.last_check_in_time {
        println!("Last check-in at {}", local_clock(last));
    }
    println!("Sync: {}", app.sync_status());
}

pub fn print_logged(entry: &LogEntry) {
    println!(
        "Logged {} for {} - {} ({})",
        Style::new().bold().paint(&*entry.category),
        local_clock(entry.period_start),
        local_clock(entry.period_end),
        format_duration(entry.duration())
    );
}

pub fn print_categories(categories: &[Category]) {
    for v in categories {
        println!("{} {}\t{}", swatch(&v.color), v.name, v.use_count);
    }
}

pub fn print_settings(settings: &Settings) {
    println!("Interval: {} h", settings.interval_hours);
    println!(
        "Sleep window: {} - {}",
        settings.sleep_start.to_12h_string(),
        settings.sleep_end.to_12h_string()
    );
}

pub fn print_insights(summary: &DaySummary) {
    println!(
        "{}\t{} check-ins\t{}",
        Style::new().bold().paint(summary.day.format("%A, %B %-d").to_string()),
        summary.check_ins,
        format_duration(summary.total)
    );
    if summary.totals.is_empty() {
        println!("No activities logged");
        return;
    }
    for v in &summary.totals {
        println!(
            "{} {}\t{}\t{}",
            swatch(&v.color),
            v.name,
            format_duration(v.duration),
            v.percentage
        );
    }
    if let Some(top) = summary.top() {
        println!();
        println!(
            "You spent {} of your tracked time on {}",
            top.percentage, top.name
        );
    }
}

pub fn print_notifications(preferences: &Preferences, armed: Option<Duration>) {
    println!("Notifications: {}", preferences.permission());
    if !preferences.excluded_hours.is_empty() {
        let hours = preferences
            .excluded_hours
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("Excluded hours: {hours}");
    }
    if let Some(delay) = armed.and_then(|v| TimeDelta::from_std(v).ok()) {
        println!("Next reminder in {}", format_countdown(delay));
    }
}
