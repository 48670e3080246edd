//! Group domain model.

use super::ValidationError;
use serde::{Deserialize, Serialize};

/// Store-assigned group identifier.
pub type GroupId = i64;

/// Named collection that tasks may optionally belong to (e.g. a room).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

impl Group {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_group_name(&self.name)
    }
}

/// Trims and validates a group name for persistence.
pub fn normalize_group_name(name: &str) -> Result<String, ValidationError> {
    validate_group_name(name)?;
    Ok(name.trim().to_string())
}

fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyGroupName);
    }
    Ok(())
}
