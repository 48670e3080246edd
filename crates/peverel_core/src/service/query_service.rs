//! Task query engine.
//!
//! # Responsibility
//! - Answer "which tasks, filtered how, sorted how" on top of any store.
//! - Attach computed due information to every returned task.
//!
//! # Invariants
//! - Results are ordered by `next_due ASC, id ASC`.
//! - An unknown group id yields an empty result, not an error.
//! - Horizon arithmetic uses the calendar date of `Clock::now()`.

use crate::clock::Clock;
use crate::due::{compute_due, DueDate};
use crate::model::task::{Task, TaskId};
use crate::repo::task_store::{EntityRef, GroupSelector, RepoError, RepoResult, TaskStore};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Filter options for [`TaskQueryService::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskQuery {
    pub group: GroupSelector,
    /// Keep tasks due on or before `today + horizon_days`. `None` disables
    /// the horizon filter.
    pub horizon_days: Option<i64>,
    /// With a horizon set, `false` additionally drops tasks due after today.
    pub include_not_yet_due: bool,
}

impl TaskQuery {
    /// Every task, no filters.
    pub fn all() -> Self {
        Self {
            group: GroupSelector::All,
            horizon_days: None,
            include_not_yet_due: true,
        }
    }

    /// Tasks already overdue or due today, across all groups.
    pub fn overdue() -> Self {
        Self {
            group: GroupSelector::All,
            horizon_days: Some(0),
            include_not_yet_due: false,
        }
    }

    pub fn in_group(mut self, group: GroupSelector) -> Self {
        self.group = group;
        self
    }
}

/// Task snapshot paired with its computed due information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueTask {
    pub task: Task,
    pub due: DueDate,
}

/// Read-only query facade over a task store.
pub struct TaskQueryService<S: TaskStore, C: Clock> {
    store: S,
    clock: C,
}

impl<S: TaskStore, C: Clock> TaskQueryService<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Lists tasks matching `query`, ordered by next due date then id.
    pub fn query(&self, query: &TaskQuery) -> RepoResult<Vec<DueTask>> {
        let now = self.clock.now();
        let today = now.date_naive();
        let cutoff = query.horizon_days.map(|days| horizon_cutoff(today, days));

        let mut items: Vec<DueTask> = self
            .store
            .list_tasks(query.group)?
            .into_iter()
            .map(|task| {
                let due = compute_due(task.last_completed, task.period, now);
                DueTask { task, due }
            })
            .filter(|item| match cutoff {
                Some(cutoff) => {
                    item.due.next_due <= cutoff
                        && (query.include_not_yet_due || item.due.next_due <= today)
                }
                None => true,
            })
            .collect();

        items.sort_by(|left, right| {
            left.due
                .next_due
                .cmp(&right.due.next_due)
                .then(left.task.id.cmp(&right.task.id))
        });
        Ok(items)
    }

    /// Number of tasks overdue or due today within `horizon_days`.
    pub fn count(&self, horizon_days: i64) -> RepoResult<usize> {
        let query = TaskQuery {
            group: GroupSelector::All,
            horizon_days: Some(horizon_days),
            include_not_yet_due: false,
        };
        Ok(self.query(&query)?.len())
    }

    /// Due information for a single task.
    pub fn task_due(&self, id: TaskId) -> RepoResult<DueTask> {
        let task = self
            .store
            .get_task(id)?
            .ok_or(RepoError::NotFound(EntityRef::Task(id)))?;
        let due = compute_due(task.last_completed, task.period, self.clock.now());
        Ok(DueTask { task, due })
    }
}

fn horizon_cutoff(today: NaiveDate, days: i64) -> NaiveDate {
    let span = Days::new(days.unsigned_abs());
    if days < 0 {
        today.checked_sub_days(span).unwrap_or(NaiveDate::MIN)
    } else {
        today.checked_add_days(span).unwrap_or(NaiveDate::MAX)
    }
}
