//! Store layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the task store contract consumed by services.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Services never branch on the concrete backend.

pub mod memory_store;
pub mod sqlite_store;
pub mod task_store;
