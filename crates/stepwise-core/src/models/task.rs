use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error reported by the callee itself (e.g. an unhandled exception).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: String,
    pub message: String,
}

/// The `{ statusCode, body }` document every task answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub status_code: i64,
    #[serde(default)]
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl TaskResult {
    pub fn new(status_code: i64, body: Value) -> Self {
        Self {
            status_code,
            body,
            error: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// The `{ statusCode: 500, body: { error } }` shape tasks use to report
    /// their own failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(500, serde_json::json!({ "error": message.into() }))
    }

    pub fn with_error(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDescriptor {
            kind: kind.into(),
            message: message.into(),
        });
        self
    }

    /// Parse a task's raw output document.
    ///
    /// Accepts `{ statusCode, body?, error? }` and the Lambda-style unhandled
    /// error `{ errorType, errorMessage }`, which maps to status 500 with the
    /// error descriptor set. `statusCode` must be a JSON integer; `"200"` or
    /// `200.0` are rejected rather than coerced.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let map = match &value {
            Value::Object(map) => map,
            other => return Err(format!("expected an object, got {}", json_type(other))),
        };

        if let Some(kind) = map.get("errorType").and_then(Value::as_str) {
            let message = map
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Ok(TaskResult::new(500, value.clone()).with_error(kind, message));
        }

        let status = map
            .get("statusCode")
            .ok_or_else(|| "missing statusCode".to_string())?;
        let status_code = status
            .as_i64()
            .ok_or_else(|| format!("statusCode must be an integer, got {}", status))?;

        let error = match map.get("error") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value::<ErrorDescriptor>(raw.clone())
                    .map_err(|e| format!("invalid error descriptor: {}", e))?,
            ),
        };

        Ok(TaskResult {
            status_code,
            body: map.get("body").cloned().unwrap_or(Value::Null),
            error,
        })
    }

    /// JSON view of the result, as seen by transition rules and downstream tasks.
    pub fn to_value(&self) -> Value {
        let mut value = serde_json::json!({
            "statusCode": self.status_code,
            "body": self.body,
        });
        if let Some(ref error) = self.error {
            value["error"] = serde_json::json!({
                "kind": error.kind,
                "message": error.message,
            });
        }
        value
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Retry policy for transient invocation failures.
///
/// Delay before attempt `n + 1` is `interval * backoff_rate^(n - 1)`,
/// capped at `max_interval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Callee-reported error kinds that are treated as transient.
    #[serde(default)]
    pub retry_on: Vec<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_backoff_rate() -> f64 {
    2.0
}

fn default_max_interval_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
            backoff_rate: default_backoff_rate(),
            max_interval_ms: default_max_interval_ms(),
            retry_on: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if !self.backoff_rate.is_finite() || self.backoff_rate < 1.0 {
            return Err(format!(
                "backoff_rate must be a finite number >= 1.0, got {}",
                self.backoff_rate
            ));
        }
        if self.max_interval_ms < self.interval_ms {
            return Err("max_interval_ms must not be smaller than interval_ms".to_string());
        }
        Ok(())
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.interval_ms as f64 * self.backoff_rate.powi(exponent);
        let capped = millis.min(self.max_interval_ms as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn retries_error_kind(&self, kind: &str) -> bool {
        self.retry_on.iter().any(|k| k == kind)
    }
}

/// One request to run a task. Immutable once built.
#[derive(Debug, Clone)]
pub struct TaskInvocation {
    pub target: String,
    pub input: Value,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}
