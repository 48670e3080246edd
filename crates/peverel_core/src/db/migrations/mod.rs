//! Chore schema migrations.
//!
//! # Invariants
//! - Versions are strictly increasing and never renumbered once shipped.
//! - All pending scripts run in one transaction together with the
//!   `PRAGMA user_version` bump.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tasks_and_groups",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "task_group_index",
        sql: include_str!("0002_task_group_index.sql"),
    },
];

/// Newest schema version this build can read and write.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Upgrades the schema to [`latest_version`]. Returns the versions applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let db_version = current_user_version(conn)?;
    let latest = latest_version();
    if db_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > db_version)
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        log::debug!(
            "event=db_migrate module=db status=apply version={} name={}",
            migration.version,
            migration.name
        );
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::Migration {
                version: migration.version,
                source,
            })?;
    }
    tx.commit()?;

    Ok(pending.iter().map(|migration| migration.version).collect())
}

/// Schema version recorded in `PRAGMA user_version`; 0 for a fresh file.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
