//! YAML schema types for workflow definitions.
//!
//! ```yaml
//! name: "leetcode-daily-report"
//! description: "Collect LeetCode stats and send a report"
//!
//! schedule:
//!   daily: { at: "08:00" }
//!
//! failure:
//!   error: "ReportFailed"
//!   cause: "Daily report could not be produced"
//!
//! tasks:
//!   fetch-stats:
//!     type: leetcode_stats
//!     username: "${LEETCODE_USERNAME}"
//!   send-report:
//!     type: report_webhook
//!     url: "${REPORT_WEBHOOK_URL}"
//!     source: "reports@example.com"
//!     destination: "me@example.com"
//!
//! producer:
//!   task: fetch-stats
//!   timeout_secs: 300
//!
//! consumer:
//!   task: send-report
//!   retry: { max_attempts: 2 }
//!   choices:
//!     rules:
//!       - when: { numeric_equals: { variable: "$.statusCode", value: 200 } }
//!         next: Succeed
//!     default: Fail
//! ```
//!
//! `${VAR}` and `${VAR:-default}` references are resolved from the
//! environment before the document is parsed.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::execution::{ExecutionState, FailureSignal};
use crate::models::task::RetryPolicy;
use crate::schedule::Schedule;
use crate::tasks::TaskDef;
use crate::workflow::classifier::TransitionRule;

/// Top-level workflow definition loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// When the workflow fires on its own. Absent means manual only.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub schedule: Option<Schedule>,

    /// Error/cause reported by every failed execution.
    #[serde(default)]
    pub failure: FailureSignal,

    /// Task id → task configuration.
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDef>,

    pub producer: StageDefinition,
    pub consumer: StageDefinition,
}

/// One stage: which task runs, how long it may take, how it is retried and
/// where its result leads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub task: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Omitted means "statusCode 200 continues, anything else fails".
    #[serde(default)]
    pub choices: Option<ChoicesDefinition>,
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoicesDefinition {
    #[serde(default)]
    pub rules: Vec<TransitionRule>,

    /// Required; a choice point without a default is rejected when the
    /// workflow is built.
    #[serde(default)]
    pub default: Option<ExecutionState>,
}

impl WorkflowDefinition {
    /// Parse a workflow definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let resolved = resolve_env_vars(yaml)?;
        serde_yaml::from_str(&resolved).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax. Unset variables
/// without a default are left untouched.
pub fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::Parse(e.to_string()))?;
    let resolved = re.replace_all(input, |caps: &regex::Captures| {
        let expr = &caps[1];
        if let Some(idx) = expr.find(":-") {
            let (name, default) = (&expr[..idx], &expr[idx + 2..]);
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        } else {
            std::env::var(expr).unwrap_or_else(|_| format!("${{{}}}", expr))
        }
    });
    Ok(resolved.into_owned())
}
