//! Core error types for Stepwise.
//!
//! - `ConfigError` is raised while a workflow is being built, never while it runs.
//! - `Fault` is an infrastructure-level invocation failure (timeout, unreachable).
//! - `InvokeError` is what the invoker hands back to the engine.
//! - `StoreError` covers the SQLite execution archive.
//! - `ServerError` is the HTTP-facing error. When the `axum` feature is
//!   enabled, it also implements `IntoResponse`.

use serde::{Deserialize, Serialize};

/// Invalid workflow configuration, detected at construction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read workflow file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse workflow YAML: {0}")]
    Parse(String),

    #[error("Stage '{stage}' references unknown task '{task}'")]
    UnknownTask { stage: String, task: String },

    #[error("Task '{0}' is registered more than once")]
    DuplicateTask(String),

    #[error("Invalid task definition '{task}': {message}")]
    InvalidTask { task: String, message: String },

    #[error("Choice point '{stage}' has no default transition")]
    MissingDefault { stage: String },

    #[error("Choice point '{stage}' cannot transition to {target}")]
    IllegalTarget { stage: String, target: String },

    #[error("Invalid JSON path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("Invalid retry policy for '{stage}': {message}")]
    InvalidRetry { stage: String, message: String },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// Infrastructure fault raised while invoking a task.
///
/// Faults are transient by nature and are retried by the invoker; once the
/// attempts are exhausted the engine routes the execution to `Fail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("unavailable: {message}")]
    Unavailable { message: String },
}

impl Fault {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Fault::Unavailable {
            message: message.into(),
        }
    }

    /// Short kind name used in logs and failure details.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Timeout { .. } => "Timeout",
            Fault::Unavailable { .. } => "Unavailable",
        }
    }
}

/// Outcome of a failed invocation, as seen by the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    #[error("Task '{target}' {fault}")]
    Fault { target: String, fault: Fault },

    /// The task answered, but not with a `{statusCode, body}` document.
    #[error("Task '{target}' returned a malformed result: {reason}")]
    ClassificationMismatch { target: String, reason: String },
}

/// Execution archive failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Execution {0} has not reached a terminal state")]
    NotTerminal(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(msg) => ServerError::Database(msg),
            StoreError::NotTerminal(id) => {
                ServerError::BadRequest(format!("Execution {} is still running", id))
            }
            StoreError::Serialization(msg) => ServerError::Internal(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ServerError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kind_and_display() {
        let timeout = Fault::Timeout { after_ms: 1500 };
        assert_eq!(timeout.kind(), "Timeout");
        assert_eq!(timeout.to_string(), "timed out after 1500ms");

        let err = InvokeError::Fault {
            target: "fetch-stats".to_string(),
            fault: Fault::unavailable("connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "Task 'fetch-stats' unavailable: connection refused"
        );
    }

    #[test]
    fn test_fault_serializes_with_kind_tag() {
        let value = serde_json::to_value(Fault::Timeout { after_ms: 10 }).unwrap();
        assert_eq!(value, serde_json::json!({ "kind": "timeout", "after_ms": 10 }));
    }
}
