//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep callers decoupled from storage details.
//!
//! Services take the store and clock by value; pass `&store` or an `Arc` to
//! share one backend between several services.

pub mod query_service;
pub mod relation_service;
pub mod task_service;
