use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Fault;
use crate::models::task::TaskResult;

/// Format of the `yearDateMonth` value handed to every task.
pub const EXECUTION_DATE_FORMAT: &str = "%Y-%m-%d";

/// States of one workflow execution.
///
/// ```text
/// Start → RunProducer → ClassifyProducer → RunConsumer → ClassifyConsumer → Succeed
///              │               │                │                │
///              └───────────────┴──────► Fail ◄──┴────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    Start,
    RunProducer,
    ClassifyProducer,
    RunConsumer,
    ClassifyConsumer,
    Succeed,
    Fail,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionState::Succeed | ExecutionState::Fail)
    }

    pub fn can_transition_to(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Start, RunProducer)
                | (RunProducer, ClassifyProducer)
                | (RunProducer, Fail)
                | (ClassifyProducer, RunConsumer)
                | (ClassifyProducer, Fail)
                | (RunConsumer, ClassifyConsumer)
                | (RunConsumer, Fail)
                | (ClassifyConsumer, Succeed)
                | (ClassifyConsumer, Fail)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionState::Start => "Start",
            ExecutionState::RunProducer => "RunProducer",
            ExecutionState::ClassifyProducer => "ClassifyProducer",
            ExecutionState::RunConsumer => "RunConsumer",
            ExecutionState::ClassifyConsumer => "ClassifyConsumer",
            ExecutionState::Succeed => "Succeed",
            ExecutionState::Fail => "Fail",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Illegal transition {from} → {to}")]
pub struct IllegalTransition {
    pub from: ExecutionState,
    pub to: ExecutionState,
}

/// What happened when a stage's task was invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed { result: TaskResult },
    Faulted { fault: Fault },
    Malformed { reason: String },
}

/// One entry of the execution's step log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub state: ExecutionState,
    pub task: String,
    pub input: Value,
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// The coarse, fixed failure signal every failed execution reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSignal {
    pub error: String,
    pub cause: String,
}

impl Default for FailureSignal {
    fn default() -> Self {
        Self {
            error: "WorkflowFailed".to_string(),
            cause: "Workflow execution failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Unavailable,
    ClassificationMismatch,
    /// The classifier routed a well-formed result to `Fail`.
    Rejected,
}

/// The original reason behind a failure, kept next to the coarse signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub step: ExecutionState,
    pub kind: FailureKind,
    pub message: String,
}

/// One run of the workflow from trigger to terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow: String,
    pub state: ExecutionState,
    /// Captured once when the execution starts; every step sees the same value.
    pub started_at: DateTime<Utc>,
    /// `started_at` as `YYYY-MM-DD`, passed to tasks as `yearDateMonth`.
    pub execution_date: String,
    pub history: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<FailureDetail>,
}

impl WorkflowExecution {
    /// A fresh execution in the `Start` state.
    pub fn start(workflow: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow: workflow.to_string(),
            state: ExecutionState::Start,
            started_at,
            execution_date: started_at.format(EXECUTION_DATE_FORMAT).to_string(),
            history: Vec::new(),
            output: None,
            failure: None,
            failure_detail: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.state == ExecutionState::Succeed
    }

    pub fn advance(&mut self, next: ExecutionState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn record(&mut self, step: StepRecord) {
        self.history.push(step);
    }

    /// Whether a task invocation was ever made for the given state.
    pub fn ran(&self, state: ExecutionState) -> bool {
        self.history.iter().any(|s| s.state == state)
    }
}
