//! Stepwise Core: transport-agnostic domain logic for scheduled task workflows.
//!
//! A workflow invokes a *producer* task, classifies its result, hands the
//! producer's output to a *consumer* task, classifies again and finishes in
//! `Succeed` or `Fail`. This crate contains:
//!
//! - the task capability trait, registry and invoker (timeouts + retries)
//! - the result classifier (ordered transition rules with a mandatory default)
//! - the workflow engine state machine
//! - the schedule trigger
//! - the SQLite execution archive
//! - built-in HTTP-backed tasks
//!
//! It has **no HTTP framework dependency** by default, making it suitable for
//! use from the CLI as well as the HTTP server.
//!
//! # Feature Flags
//!
//! - `axum`: Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod db;
pub mod error;
pub mod models;
pub mod schedule;
pub mod store;
pub mod tasks;
pub mod workflow;

// Convenience re-exports
pub use db::Database;
pub use error::{ConfigError, Fault, InvokeError, ServerError, StoreError};
pub use models::execution::{ExecutionState, WorkflowExecution};
pub use models::task::{TaskInvocation, TaskResult};
pub use store::ExecutionStore;
pub use workflow::{Task, TaskRegistry, Workflow, WorkflowDefinition};
