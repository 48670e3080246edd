//! Relation manager for task→group assignments.
//!
//! # Responsibility
//! - Create, overwrite and clear task→group relations.
//! - Delete tasks and groups without leaving dangling relations.
//!
//! # Invariants
//! - A relation is only written between an existing task and an existing group.
//! - Assigning overwrites any previous group of the task.
//! - `assign` over several ids is best-effort: the first failure stops the
//!   loop and earlier ids in the same call stay assigned.

use crate::model::group::GroupId;
use crate::model::task::TaskId;
use crate::repo::task_store::{EntityRef, RepoError, RepoResult, TaskStore};
use log::{info, warn};

/// Use-case facade for relation and delete operations.
pub struct RelationService<S: TaskStore> {
    store: S,
}

impl<S: TaskStore> RelationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Assigns every task in `task_ids` to `group_id`, in order.
    ///
    /// # Errors
    /// - `NotFound(Group)` when the group does not exist.
    /// - `NotFound(Task)` for the first unknown task id; ids before it remain
    ///   assigned.
    pub fn assign(&self, group_id: GroupId, task_ids: &[TaskId]) -> RepoResult<()> {
        for (assigned, &task_id) in task_ids.iter().enumerate() {
            if let Err(err) = self.assign_one(group_id, task_id) {
                warn!(
                    "event=relation_assign module=relation status=error group_id={} task_id={} assigned_before_error={} error={}",
                    group_id, task_id, assigned, err
                );
                return Err(err);
            }
        }

        info!(
            "event=relation_assign module=relation status=ok group_id={} tasks={}",
            group_id,
            task_ids.len()
        );
        Ok(())
    }

    fn assign_one(&self, group_id: GroupId, task_id: TaskId) -> RepoResult<()> {
        if self.store.get_group(group_id)?.is_none() {
            return Err(RepoError::NotFound(EntityRef::Group(group_id)));
        }
        if self.store.get_task(task_id)?.is_none() {
            return Err(RepoError::NotFound(EntityRef::Task(task_id)));
        }
        self.store.set_task_group(task_id, Some(group_id))
    }

    /// Clears the group of `task_id`. A task without a group is left as is.
    pub fn unassign(&self, task_id: TaskId) -> RepoResult<()> {
        self.store.set_task_group(task_id, None)?;
        info!("event=relation_unassign module=relation status=ok task_id={task_id}");
        Ok(())
    }

    /// Deletes a group and unassigns all of its tasks. Returns how many tasks
    /// lost their group.
    pub fn delete_group(&self, group_id: GroupId) -> RepoResult<usize> {
        let unassigned = self.store.delete_group(group_id)?;
        info!(
            "event=group_delete module=relation status=ok group_id={group_id} unassigned={unassigned}"
        );
        Ok(unassigned)
    }

    /// Deletes a task together with its relation.
    pub fn delete_task(&self, task_id: TaskId) -> RepoResult<()> {
        self.store.delete_task(task_id)?;
        info!("event=task_delete module=relation status=ok task_id={task_id}");
        Ok(())
    }
}
