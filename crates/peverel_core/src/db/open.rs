//! Connection bootstrap.
//!
//! # Invariants
//! - `foreign_keys=ON` on every returned connection; deleting a group relies
//!   on `ON DELETE SET NULL` for `tasks.group_id`.
//! - File databases run in WAL mode so the notifier can read while another
//!   process writes.
//! - Returned connections are fully migrated.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const MEMORY_CONN_STRING: &str = ":memory:";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the task database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    File(PathBuf),
    /// Private database dropped with the connection.
    Memory,
}

impl DbTarget {
    /// `:memory:` selects an in-memory database; anything else is a file path.
    pub fn parse(conn_string: &str) -> Self {
        match conn_string.trim() {
            MEMORY_CONN_STRING => Self::Memory,
            path => Self::File(PathBuf::from(path)),
        }
    }
}

impl Display for DbTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => write!(f, "{MEMORY_CONN_STRING}"),
        }
    }
}

/// Opens (creating if needed) a database file and migrates it.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_target(&DbTarget::File(path.as_ref().to_path_buf()))
}

pub fn open_db_in_memory() -> DbResult<Connection> {
    open_target(&DbTarget::Memory)
}

/// Opens `target`, applies pragmas and pending migrations.
///
/// Emits one `db_open` start event and one ok/error event with the elapsed
/// time.
pub fn open_target(target: &DbTarget) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = match target {
        DbTarget::File(_) => "file",
        DbTarget::Memory => "memory",
    };
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect(target).and_then(|mut conn| {
        prepare_connection(&mut conn, target)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={} duration_ms={} error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn connect(target: &DbTarget) -> DbResult<Connection> {
    let conn = match target {
        DbTarget::File(path) => Connection::open(path)?,
        DbTarget::Memory => Connection::open_in_memory()?,
    };
    Ok(conn)
}

fn prepare_connection(conn: &mut Connection, target: &DbTarget) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if matches!(target, DbTarget::File(_)) {
        // journal_mode returns the resulting mode as a row.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    let applied = apply_migrations(conn)?;
    if !applied.is_empty() {
        info!(
            "event=db_migrate module=db status=ok target={} applied={:?}",
            target, applied
        );
    }
    Ok(())
}
