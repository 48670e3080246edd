//! SQLite-backed task store.
//!
//! # Responsibility
//! - Persist tasks, groups and relations in the migrated SQLite schema.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - The connection is owned behind a mutex; every call holds it for the
//!   whole operation, so multi-statement writes are never interleaved.
//! - `last_completed` is stored as RFC 3339 text in UTC.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory, open_target, DbTarget};
use crate::model::group::{Group, GroupId};
use crate::model::task::{Task, TaskFields, TaskId};
use crate::repo::task_store::{EntityRef, GroupSelector, RepoError, RepoResult, TaskStore};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    period,
    last_completed,
    group_id
FROM tasks";

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("groups", &["id", "name"]),
    (
        "tasks",
        &[
            "id",
            "name",
            "description",
            "period",
            "last_completed",
            "group_id",
        ],
    ),
];

/// Task store over a single migrated SQLite connection.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Wraps an already migrated connection.
    ///
    /// # Errors
    /// - `InvalidData` when schema version or required tables/columns differ
    ///   from what this binary expects.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Opens a database from a connection string: a file path or `:memory:`.
    pub fn connect(conn_string: &str) -> RepoResult<Self> {
        Self::try_new(open_target(&DbTarget::parse(conn_string))?)
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepoError::LockPoisoned)
    }
}

impl TaskStore for SqliteTaskStore {
    fn add_task(&self, fields: &TaskFields, last_completed: DateTime<Utc>) -> RepoResult<TaskId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (name, description, period, last_completed)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                fields.name.as_str(),
                fields.description.as_str(),
                i64::from(fields.period),
                timestamp_to_db(last_completed),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("event=task_insert module=store status=ok backend=sqlite task_id={id}");
        Ok(id)
    }

    fn add_group(&self, name: &str) -> RepoResult<GroupId> {
        let conn = self.lock()?;
        conn.execute("INSERT INTO groups (name) VALUES (?1);", [name])?;
        let id = conn.last_insert_rowid();
        debug!("event=group_insert module=store status=ok backend=sqlite group_id={id}");
        Ok(id)
    }

    fn complete_task(&self, id: TaskId, completed_at: DateTime<Utc>) -> RepoResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET last_completed = ?1 WHERE id = ?2;",
            params![timestamp_to_db(completed_at), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Task(id)));
        }
        Ok(())
    }

    fn update_task(&self, id: TaskId, fields: &TaskFields) -> RepoResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks
             SET name = ?1, description = ?2, period = ?3
             WHERE id = ?4;",
            params![
                fields.name.as_str(),
                fields.description.as_str(),
                i64::from(fields.period),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Task(id)));
        }
        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Task(id)));
        }
        Ok(())
    }

    fn delete_group(&self, id: GroupId) -> RepoResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if !group_exists(&tx, id)? {
            return Err(RepoError::NotFound(EntityRef::Group(id)));
        }

        let unassigned = tx.execute(
            "UPDATE tasks SET group_id = NULL WHERE group_id = ?1;",
            [id],
        )?;
        tx.execute("DELETE FROM groups WHERE id = ?1;", [id])?;
        tx.commit()?;

        debug!(
            "event=group_delete module=store status=ok backend=sqlite group_id={id} unassigned={unassigned}"
        );
        Ok(unassigned)
    }

    fn set_task_group(&self, task_id: TaskId, group_id: Option<GroupId>) -> RepoResult<()> {
        let conn = self.lock()?;
        if let Some(group_id) = group_id {
            if !group_exists(&conn, group_id)? {
                return Err(RepoError::NotFound(EntityRef::Group(group_id)));
            }
        }

        let changed = conn.execute(
            "UPDATE tasks SET group_id = ?1 WHERE id = ?2;",
            params![group_id, task_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Task(task_id)));
        }
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn get_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        let conn = self.lock()?;
        let name: Option<String> = conn
            .query_row("SELECT name FROM groups WHERE id = ?1;", [id], |row| {
                row.get(0)
            })
            .optional()?;
        name.map(|name| parse_group(id, name)).transpose()
    }

    fn list_groups(&self) -> RepoResult<Vec<Group>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM groups ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group(row.get("id")?, row.get("name")?)?);
        }
        Ok(groups)
    }

    fn list_tasks(&self, selector: GroupSelector) -> RepoResult<Vec<Task>> {
        let conn = self.lock()?;
        let filter = match selector {
            GroupSelector::All => "",
            GroupSelector::Unassigned => " WHERE group_id IS NULL",
            GroupSelector::Group(_) => " WHERE group_id = ?1",
        };
        let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL}{filter} ORDER BY id ASC;"))?;
        let mut rows = match selector {
            GroupSelector::Group(group_id) => stmt.query([group_id])?,
            GroupSelector::All | GroupSelector::Unassigned => stmt.query([])?,
        };

        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn group_name_for_task(&self, id: TaskId) -> RepoResult<Option<String>> {
        let conn = self.lock()?;
        let found: Option<Option<String>> = conn
            .query_row(
                "SELECT g.name
                 FROM tasks t
                 LEFT JOIN groups g ON g.id = t.group_id
                 WHERE t.id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        found.ok_or(RepoError::NotFound(EntityRef::Task(id)))
    }
}

fn group_exists(conn: &Connection, id: GroupId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id: TaskId = row.get("id")?;

    let period_value: i64 = row.get("period")?;
    let period = u32::try_from(period_value).map_err(|_| {
        RepoError::InvalidData(format!("invalid period `{period_value}` in tasks.period"))
    })?;

    let last_completed_text: String = row.get("last_completed")?;
    let last_completed = timestamp_from_db(&last_completed_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{last_completed_text}` in tasks.last_completed"
        ))
    })?;

    let task = Task {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        period,
        last_completed,
        group_id: row.get("group_id")?,
    };
    task.validate()
        .map_err(|err| RepoError::InvalidData(format!("task {id}: {err}")))?;
    Ok(task)
}

fn parse_group(id: GroupId, name: String) -> RepoResult<Group> {
    let group = Group { id, name };
    group
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("group {id}: {err}")))?;
    Ok(group)
}

fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn timestamp_from_db(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::InvalidData(format!(
            "task store requires schema version {expected_version}, got {actual_version}"
        )));
    }

    for (table, columns) in REQUIRED_COLUMNS {
        for column in *columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::InvalidData(format!(
                    "task store requires column `{column}` in table `{table}`"
                )));
            }
        }
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
