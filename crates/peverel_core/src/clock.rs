//! Clock port for obtaining the current instant.
//!
//! # Responsibility
//! - Abstract wall-clock access so due dates and schedules are testable.
//! - Carry the UTC offset that defines calendar-day boundaries.
//!
//! # Invariants
//! - Every calendar-day computation in core uses the offset of `Clock::now()`.

use chrono::{DateTime, FixedOffset, Local, Utc};
use std::sync::Arc;

/// Provides the current instant together with the local UTC offset.
pub trait Clock: Send + Sync {
    /// Returns the current time in the clock's offset.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Returns the current time normalized to UTC for persistence.
    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

/// Live clock backed by the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Clock pinned to one instant. Used by tests and one-shot replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn new(instant: DateTime<FixedOffset>) -> Self {
        Self { instant }
    }

    /// Parses an RFC 3339 timestamp such as `2025-03-10T21:30:00+01:00`.
    pub fn parse(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self::new)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.instant
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}
