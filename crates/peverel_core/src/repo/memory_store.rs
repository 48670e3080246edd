//! In-memory task store.
//!
//! Volatile backend with the same observable behavior as the SQLite store.
//! Used for tests and throwaway demo sessions.
//!
//! # Invariants
//! - Ids start at 1 and are never reused, even after deletion.
//! - All state lives behind one mutex, so `delete_group` and the relation
//!   cleanup it implies happen in a single critical section.

use crate::model::group::{Group, GroupId};
use crate::model::task::{Task, TaskFields, TaskId};
use crate::repo::task_store::{EntityRef, GroupSelector, RepoError, RepoResult, TaskStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    tasks: BTreeMap<TaskId, Task>,
    groups: BTreeMap<GroupId, Group>,
    last_task_id: TaskId,
    last_group_id: GroupId,
}

impl MemoryState {
    fn task_mut(&mut self, id: TaskId) -> RepoResult<&mut Task> {
        self.tasks
            .get_mut(&id)
            .ok_or(RepoError::NotFound(EntityRef::Task(id)))
    }
}

/// Task store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    state: Mutex<MemoryState>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| RepoError::LockPoisoned)
    }
}

impl TaskStore for MemoryTaskStore {
    fn add_task(&self, fields: &TaskFields, last_completed: DateTime<Utc>) -> RepoResult<TaskId> {
        let mut state = self.lock()?;
        state.last_task_id += 1;
        let id = state.last_task_id;
        state.tasks.insert(
            id,
            Task {
                id,
                name: fields.name.clone(),
                description: fields.description.clone(),
                period: fields.period,
                last_completed,
                group_id: None,
            },
        );
        Ok(id)
    }

    fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        let mut state = self.lock()?;
        state.last_group_id += 1;
        let id = state.last_group_id;
        state.groups.insert(
            id,
            Group {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    fn complete_task(&self, id: TaskId, completed_at: DateTime<Utc>) -> RepoResult<()> {
        let mut state = self.lock()?;
        state.task_mut(id)?.last_completed = completed_at;
        Ok(())
    }

    fn update_task(&self, id: TaskId, fields: &TaskFields) -> RepoResult<()> {
        let mut state = self.lock()?;
        let task = state.task_mut(id)?;
        task.name = fields.name.clone();
        task.description = fields.description.clone();
        task.period = fields.period;
        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let mut state = self.lock()?;
        state
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound(EntityRef::Task(id)))
    }

    fn delete_group(&self, id: GroupId) -> RepoResult<usize> {
        let mut state = self.lock()?;
        if state.groups.remove(&id).is_none() {
            return Err(RepoError::NotFound(EntityRef::Group(id)));
        }

        let mut unassigned = 0;
        for task in state.tasks.values_mut() {
            if task.group_id == Some(id) {
                task.group_id = None;
                unassigned += 1;
            }
        }
        Ok(unassigned)
    }

    fn set_task_group(&self, task_id: TaskId, group_id: Option<GroupId>) -> RepoResult<()> {
        let mut state = self.lock()?;
        if let Some(group_id) = group_id {
            if !state.groups.contains_key(&group_id) {
                return Err(RepoError::NotFound(EntityRef::Group(group_id)));
            }
        }
        state.task_mut(task_id)?.group_id = group_id;
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        Ok(self.lock()?.tasks.get(&id).cloned())
    }

    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        Ok(self.lock()?.groups.get(&id).cloned())
    }

    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        Ok(self.lock()?.groups.values().cloned().collect())
    }

    fn list_tasks(&self, selector: GroupSelector) -> RepoResult<Vec<Task>> {
        Ok(self
            .lock()?
            .tasks
            .values()
            .filter(|task| selector.matches(task.group_id))
            .cloned()
            .collect())
    }

    fn group_name_for_task(&self, id: TaskId) -> RepoResult<Option<String>> {
        let state = self.lock()?;
        let task = state
            .tasks
            .get(&id)
            .ok_or(RepoError::NotFound(EntityRef::Task(id)))?;
        Ok(task
            .group_id
            .and_then(|group_id| state.groups.get(&group_id))
            .map(|group| group.name.clone()))
    }
}
