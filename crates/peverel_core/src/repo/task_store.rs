//! Task store contract shared by every storage backend.
//!
//! # Responsibility
//! - Define the keyed persistence API for tasks, groups and their relation.
//! - Define the error type returned across the store boundary.
//!
//! # Invariants
//! - Implementations own the canonical state and return cloned snapshots.
//! - Implementations serialize conflicting writes internally; callers hold
//!   no locks.
//! - `delete_group` clears every relation to the group in the same
//!   consistency unit as the delete.
//! - `list_tasks` returns tasks in ascending id order.

use crate::db::DbError;
use crate::model::group::{Group, GroupId};
use crate::model::task::{Task, TaskFields, TaskId};
use crate::model::ValidationError;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity referenced by a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Task(TaskId),
    Group(GroupId),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task {id}"),
            Self::Group(id) => write!(f, "group {id}"),
        }
    }
}

/// Error returned by store backends and the services above them.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    NotFound(EntityRef),
    Db(DbError),
    /// A persisted row violates entity invariants.
    InvalidData(String),
    /// A previous writer panicked while holding the store lock.
    LockPoisoned,
}

impl RepoError {
    /// True for transient storage failures (as opposed to caller mistakes).
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Db(_) | Self::InvalidData(_) | Self::LockPoisoned)
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::LockPoisoned => write!(f, "task store lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::LockPoisoned => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Group filter applied to task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupSelector {
    /// No group filter.
    #[default]
    All,
    /// Only tasks without a group.
    Unassigned,
    /// Only tasks assigned to this group. Unknown ids match nothing.
    Group(GroupId),
}

impl GroupSelector {
    pub fn matches(&self, group_id: Option<GroupId>) -> bool {
        match self {
            Self::All => true,
            Self::Unassigned => group_id.is_none(),
            Self::Group(id) => group_id == Some(*id),
        }
    }
}

/// Keyed storage for tasks, groups and the task→group relation.
pub trait TaskStore: Send + Sync {
    /// Inserts a task and returns its new id. `fields` must be validated.
    fn add_task(&self, fields: &TaskFields, last_completed: DateTime<Utc>) -> RepoResult<TaskId>;
    /// Inserts a group and returns its new id. `name` must be validated.
    fn add_group(&self, name: &str) -> RepoResult<GroupId>;
    fn complete_task(&self, id: TaskId, completed_at: DateTime<Utc>) -> RepoResult<()>;
    /// Replaces name, description and period of an existing task.
    fn update_task(&self, id: TaskId, fields: &TaskFields) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Deletes a group and unassigns its tasks. Returns how many were unassigned.
    fn delete_group(&self, id: GroupId) -> RepoResult<usize>;
    /// Overwrites (or clears, with `None`) the relation of one task.
    fn set_task_group(&self, task_id: TaskId, group_id: Option<GroupId>) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>>;
    /// Lists all groups ordered by id.
    fn list_groups(&self) -> RepoResult<Vec<Group>>;
    /// Lists tasks matching `selector`, ordered by id.
    fn list_tasks(&self, selector: GroupSelector) -> RepoResult<Vec<Task>>;
    /// Name of the task's group, or `None` when unassigned.
    fn group_name_for_task(&self, id: TaskId) -> RepoResult<Option<String>>;
}

impl<S: TaskStore + ?Sized> TaskStore for &S {
    fn add_task(&self, fields: &TaskFields, last_completed: DateTime<Utc>) -> RepoResult<TaskId> {
        (**self).add_task(fields, last_completed)
    }

    fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        (**self).add_group(name)
    }

    fn complete_task(&self, id: TaskId, completed_at: DateTime<Utc>) -> RepoResult<()> {
        (**self).complete_task(id, completed_at)
    }

    fn update_task(&self, id: TaskId, fields: &TaskFields) -> RepoResult<()> {
        (**self).update_task(id, fields)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        (**self).delete_task(id)
    }

    fn delete_group(&self, id: GroupId) -> RepoResult<usize> {
        (**self).delete_group(id)
    }

    fn set_task_group(&self, task_id: TaskId, group_id: Option<GroupId>) -> RepoResult<()> {
        (**self).set_task_group(task_id, group_id)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        (**self).get_task(id)
    }

    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        (**self).get_group(id)
    }

    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        (**self).list_groups()
    }

    fn list_tasks(&self, selector: GroupSelector) -> RepoResult<Vec<Task>> {
        (**self).list_tasks(selector)
    }

    fn group_name_for_task(&self, id: TaskId) -> RepoResult<Option<String>> {
        (**self).group_name_for_task(id)
    }
}

impl<S: TaskStore + ?Sized> TaskStore for Arc<S> {
    fn add_task(&self, fields: &TaskFields, last_completed: DateTime<Utc>) -> RepoResult<TaskId> {
        (**self).add_task(fields, last_completed)
    }

    fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        (**self).add_group(name)
    }

    fn complete_task(&self, id: TaskId, completed_at: DateTime<Utc>) -> RepoResult<()> {
        (**self).complete_task(id, completed_at)
    }

    fn update_task(&self, id: TaskId, fields: &TaskFields) -> RepoResult<()> {
        (**self).update_task(id, fields)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        (**self).delete_task(id)
    }

    fn delete_group(&self, id: GroupId) -> RepoResult<usize> {
        (**self).delete_group(id)
    }

    fn set_task_group(&self, task_id: TaskId, group_id: Option<GroupId>) -> RepoResult<()> {
        (**self).set_task_group(task_id, group_id)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        (**self).get_task(id)
    }

    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        (**self).get_group(id)
    }

    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        (**self).list_groups()
    }

    fn list_tasks(&self, selector: GroupSelector) -> RepoResult<Vec<Task>> {
        (**self).list_tasks(selector)
    }

    fn group_name_for_task(&self, id: TaskId) -> RepoResult<Option<String>> {
        (**self).group_name_for_task(id)
    }
}
