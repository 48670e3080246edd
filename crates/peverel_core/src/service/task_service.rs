//! Task and group use-case service.
//!
//! # Responsibility
//! - Provide validated create/update/complete entry points for callers.
//! - Stamp completion and default creation times from the injected clock.
//!
//! # Invariants
//! - Service APIs never bypass entity validation before store writes.
//! - Names are trimmed before validation and persistence.

use crate::clock::Clock;
use crate::model::group::{normalize_group_name, Group, GroupId};
use crate::model::task::{Task, TaskFields, TaskId};
use crate::repo::task_store::{EntityRef, RepoError, RepoResult, TaskStore};
use chrono::{DateTime, Utc};
use log::info;

/// Use-case service wrapper for task and group CRUD operations.
pub struct TaskService<S: TaskStore, C: Clock> {
    store: S,
    clock: C,
}

impl<S: TaskStore, C: Clock> TaskService<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Creates a task. `last_completed` defaults to the clock's current instant.
    pub fn add_task(
        &self,
        fields: &TaskFields,
        last_completed: Option<DateTime<Utc>>,
    ) -> RepoResult<TaskId> {
        let fields = fields.normalized();
        fields.validate()?;

        let last_completed = last_completed.unwrap_or_else(|| self.clock.now_utc());
        let id = self.store.add_task(&fields, last_completed)?;
        info!(
            "event=task_add module=task status=ok task_id={} period={}",
            id, fields.period
        );
        Ok(id)
    }

    /// Creates a group from a non-blank name.
    pub fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        let name = normalize_group_name(name)?;
        let id = self.store.add_group(&name)?;
        info!("event=group_add module=task status=ok group_id={id}");
        Ok(id)
    }

    /// Marks a task as completed now.
    pub fn complete_task(&self, id: TaskId) -> RepoResult<DateTime<Utc>> {
        let completed_at = self.clock.now_utc();
        self.store.complete_task(id, completed_at)?;
        info!("event=task_complete module=task status=ok task_id={id}");
        Ok(completed_at)
    }

    /// Replaces name, description and period of an existing task.
    pub fn update_task(&self, id: TaskId, fields: &TaskFields) -> RepoResult<()> {
        let fields = fields.normalized();
        fields.validate()?;
        self.store.update_task(id, &fields)
    }

    pub fn get_task(&self, id: TaskId) -> RepoResult<Task> {
        self.store
            .get_task(id)?
            .ok_or(RepoError::NotFound(EntityRef::Task(id)))
    }

    pub fn get_group(&self, id: GroupId) -> RepoResult<Group> {
        self.store
            .get_group(id)?
            .ok_or(RepoError::NotFound(EntityRef::Group(id)))
    }

    pub fn list_groups(&self) -> RepoResult<Vec<Group>> {
        self.store.list_groups()
    }

    /// Name of the task's group; `None` means the task is unassigned.
    pub fn group_name_for_task(&self, id: TaskId) -> RepoResult<Option<String>> {
        self.store.group_name_for_task(id)
    }
}
