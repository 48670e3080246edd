//! Domain model for recurring chores.
//!
//! # Responsibility
//! - Define the canonical task and group records used by core logic.
//! - Own the entity invariants shared by every store backend.
//!
//! # Invariants
//! - Ids are assigned by the store and never reused.
//! - Task names and group names are non-empty after trimming.
//! - Task period is at least one day.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod group;
pub mod task;

/// Entity invariant violation. Always surfaced to the caller, never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Task name is blank after trimming.
    EmptyTaskName,
    /// Group name is blank after trimming.
    EmptyGroupName,
    /// Period must be at least one day.
    InvalidPeriod(i64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTaskName => write!(f, "task name must not be blank"),
            Self::EmptyGroupName => write!(f, "group name must not be blank"),
            Self::InvalidPeriod(period) => {
                write!(f, "task period must be at least 1 day, got {period}")
            }
        }
    }
}

impl Error for ValidationError {}
