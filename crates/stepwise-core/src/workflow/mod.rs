//! Workflow engine: a two-stage, classifier-driven task pipeline.
//!
//! A workflow YAML declares the tasks, the producer and consumer stages and
//! the transition rules evaluated after each stage.
//!
//! # Architecture
//!
//! ```text
//! workflow.yaml ──► WorkflowDefinition ──► Workflow ◄── TaskRegistry
//!                                             │
//!                                        TaskInvoker ──► dyn Task (http, fn, ...)
//!                                             │
//!                                        ChoiceRules (classifier)
//!                                             │
//!                                      WorkflowExecution (Succeed | Fail)
//! ```

pub mod classifier;
pub mod engine;
pub mod invoker;
pub mod jsonpath;
pub mod registry;
pub mod schema;

pub use classifier::{ChoiceRules, Condition, TransitionRule};
pub use engine::{Stage, Workflow};
pub use invoker::{Invocation, Task, TaskInvoker};
pub use registry::TaskRegistry;
pub use schema::{StageDefinition, WorkflowDefinition};
