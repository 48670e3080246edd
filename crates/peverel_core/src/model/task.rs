//! Task domain model.
//!
//! # Responsibility
//! - Define the persisted chore record and its editable field set.
//! - Validate task invariants before any store mutation.
//!
//! # Invariants
//! - `period >= 1`.
//! - `last_completed` always holds a value; it defaults to creation time.
//! - `group_id` is the only representation of the task→group relation.

use super::group::GroupId;
use super::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned task identifier.
pub type TaskId = i64;

/// Canonical chore record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Free text; may be empty.
    pub description: String,
    /// Days between required completions.
    pub period: u32,
    /// Instant of the most recent completion, normalized to UTC.
    pub last_completed: DateTime<Utc>,
    /// Assigned group, if any.
    pub group_id: Option<GroupId>,
}

impl Task {
    /// Re-checks invariants on a record read back from storage.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_period(i64::from(self.period))
    }
}

/// Caller-editable task fields used by both create and full-replace update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    pub name: String,
    pub description: String,
    pub period: u32,
}

impl TaskFields {
    pub fn new(name: impl Into<String>, description: impl Into<String>, period: u32) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            period,
        }
    }

    /// Returns a copy with surrounding whitespace removed from the name.
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            period: self.period,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_period(i64::from(self.period))
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyTaskName);
    }
    Ok(())
}

pub(crate) fn validate_period(period: i64) -> Result<(), ValidationError> {
    if period < 1 {
        return Err(ValidationError::InvalidPeriod(period));
    }
    Ok(())
}
