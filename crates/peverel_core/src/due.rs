//! Due-date calculator.
//!
//! # Responsibility
//! - Map a task's last completion and period to its next due calendar date.
//! - Express that date as a signed day offset from "today".
//!
//! # Invariants
//! - Time of day is discarded before adding the period.
//! - `last_completed` and `now` are truncated to dates in the same offset
//!   (the clock's), so results never drift across midnight.
//! - Pure and total: overflowing dates saturate at `NaiveDate::MAX`.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Position of a due date relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueState {
    Overdue,
    DueToday,
    Upcoming,
}

/// Computed due information for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDate {
    /// Calendar date the task is next expected to be completed.
    pub next_due: NaiveDate,
    /// `next_due - today` in whole days; negative means overdue.
    pub days_offset: i64,
}

impl DueDate {
    pub fn state(&self) -> DueState {
        match self.days_offset {
            offset if offset < 0 => DueState::Overdue,
            0 => DueState::DueToday,
            _ => DueState::Upcoming,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.days_offset < 0
    }

    /// Short human-readable distance, e.g. `today`, `3 days ago`, `in 1 day`.
    pub fn describe(&self) -> String {
        let days = self.days_offset.unsigned_abs();
        let unit = if days == 1 { "day" } else { "days" };
        match self.state() {
            DueState::DueToday => "today".to_string(),
            DueState::Overdue => format!("{days} {unit} ago"),
            DueState::Upcoming => format!("in {days} {unit}"),
        }
    }
}

/// Calendar date of `instant` as observed in `offset`.
pub fn date_in(instant: DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    instant.with_timezone(offset).date_naive()
}

/// `dateOnly(last_completed) + period` days, with dates taken in `offset`.
pub fn next_due_date(
    last_completed: DateTime<Utc>,
    period: u32,
    offset: &FixedOffset,
) -> NaiveDate {
    date_in(last_completed, offset)
        .checked_add_days(Days::new(u64::from(period)))
        .unwrap_or(NaiveDate::MAX)
}

/// Computes next due date and day offset relative to `now`.
pub fn compute_due(
    last_completed: DateTime<Utc>,
    period: u32,
    now: DateTime<FixedOffset>,
) -> DueDate {
    let offset = *now.offset();
    let next_due = next_due_date(last_completed, period, &offset);
    let today = now.date_naive();
    DueDate {
        next_due,
        days_offset: next_due.signed_duration_since(today).num_days(),
    }
}
