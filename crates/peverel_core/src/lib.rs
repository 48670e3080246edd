//! Core domain logic for Peverel.
//! This crate is the single source of truth for chore scheduling invariants.

pub mod clock;
pub mod db;
pub mod due;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use due::{compute_due, next_due_date, DueDate, DueState};
pub use logging::{default_log_level, init_logging, logging_status, LogOutput};
pub use model::group::{Group, GroupId};
pub use model::task::{Task, TaskFields, TaskId};
pub use model::ValidationError;
pub use repo::memory_store::MemoryTaskStore;
pub use repo::sqlite_store::SqliteTaskStore;
pub use repo::task_store::{EntityRef, GroupSelector, RepoError, RepoResult, TaskStore};
pub use service::query_service::{DueTask, TaskQuery, TaskQueryService};
pub use service::relation_service::RelationService;
pub use service::task_service::TaskService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
