use std::{fmt::Display, ops::Deref};

use chrono::Duration;

/// Whole-number share of a total, as shown in summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percentage(u32);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Deref for Percentage {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Rounds to the nearest integer. An empty whole yields 0%.
pub fn duration_percentage(value: Duration, whole: Duration) -> Percentage {
    let whole = whole.num_milliseconds();
    if whole <= 0 {
        return Percentage(0);
    }
    let value = value.num_milliseconds().max(0) as f64;
    Percentage((value / whole as f64 * 100.).round() as u32)
}
