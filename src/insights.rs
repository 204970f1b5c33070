use std::{collections::HashMap, sync::Arc};

use chrono::{Duration, NaiveDate, TimeZone};

use crate::{
    state::entities::{Category, LogEntry},
    utils::{
        percentage::{duration_percentage, Percentage},
        time::local_day_bounds,
    },
};

/// Shown for logs whose category no longer exists.
pub const UNKNOWN_CATEGORY_COLOR: &str = "#6b7280";

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub name: Arc<str>,
    pub duration: Duration,
    pub percentage: Percentage,
    pub color: Arc<str>,
}

impl CategoryTotal {
    fn new(name: Arc<str>) -> Self {
        Self {
            name,
            duration: Duration::zero(),
            percentage: Percentage::default(),
            color: UNKNOWN_CATEGORY_COLOR.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub day: NaiveDate,
    /// Longest first.
    pub totals: Vec<CategoryTotal>,
    pub total: Duration,
    pub check_ins: usize,
}

impl DaySummary {
    pub fn top(&self) -> Option<&CategoryTotal> {
        self.totals.first()
    }
}

/// Sums tracked time per category for the logs recorded during `day` in `timezone`.
/// Categories with equal time keep the order in which they first appear in `logs`.
pub fn summarize_day<Tz: TimeZone>(
    logs: &[LogEntry],
    categories: &[Category],
    day: NaiveDate,
    timezone: &Tz,
) -> DaySummary {
    let (start, end) = local_day_bounds(timezone, day);
    let (start, end) = (start.to_utc(), end.to_utc());

    let mut positions = HashMap::<Arc<str>, usize>::new();
    let mut totals = Vec::<CategoryTotal>::new();
    let mut total = Duration::zero();
    let mut check_ins = 0;

    for log in logs
        .iter()
        .filter(|v| v.timestamp >= start && v.timestamp < end)
    {
        check_ins += 1;
        total += log.duration();
        let position = *positions.entry(log.category.clone()).or_insert_with(|| {
            totals.push(CategoryTotal::new(log.category.clone()));
            totals.len() - 1
        });
        totals[position].duration += log.duration();
    }

    for v in totals.iter_mut() {
        v.percentage = duration_percentage(v.duration, total);
        if let Some(category) = categories.iter().find(|c| c.name == v.name) {
            v.color = category.color.clone();
        }
    }
    totals.sort_by(|a, b| b.duration.cmp(&a.duration));

    DaySummary {
        day,
        totals,
        total,
        check_ins,
    }
}
