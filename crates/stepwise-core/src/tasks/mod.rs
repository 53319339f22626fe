//! Built-in tasks and their YAML configuration.
//!
//! ```yaml
//! tasks:
//!   fetch-stats:
//!     type: leetcode_stats
//!     username: "${LEETCODE_USERNAME}"
//!   send-report:
//!     type: report_webhook
//!     url: "${REPORT_WEBHOOK_URL}"
//!     source: "reports@example.com"
//!     destination: "me@example.com"
//!   custom:
//!     type: http
//!     url: "https://example.com/invoke"
//!     headers: { Authorization: "Bearer ${TOKEN}" }
//! ```

pub mod function;
pub mod http;
pub mod leetcode;
pub mod report;

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::workflow::registry::TaskRegistry;

pub use function::FnTask;
pub use http::HttpTask;
pub use leetcode::LeetcodeStatsTask;
pub use report::ReportWebhookTask;

pub const DEFAULT_LEETCODE_API: &str = "https://alfa-leetcode-api.onrender.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskDef {
    /// POST the input document to `url` and parse the response as a task result.
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Fetch accepted submissions and the solved summary for a user.
    LeetcodeStats {
        #[serde(default = "default_leetcode_api")]
        base_url: String,
        username: String,
        #[serde(default = "default_submission_limit")]
        submission_limit: u32,
    },
    /// Render the stats report and deliver it to a webhook.
    ReportWebhook {
        url: String,
        source: String,
        destination: String,
    },
}

fn default_leetcode_api() -> String {
    DEFAULT_LEETCODE_API.to_string()
}

fn default_submission_limit() -> u32 {
    10
}

impl TaskDef {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskDef::Http { .. } => "http",
            TaskDef::LeetcodeStats { .. } => "leetcode_stats",
            TaskDef::ReportWebhook { .. } => "report_webhook",
        }
    }

    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        let required = |field: &str, value: &str| -> Result<(), ConfigError> {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidTask {
                    task: id.to_string(),
                    message: format!("'{}' must not be empty", field),
                });
            }
            if value.contains("${") {
                return Err(ConfigError::InvalidTask {
                    task: id.to_string(),
                    message: format!("'{}' has an unresolved variable: {}", field, value),
                });
            }
            Ok(())
        };

        match self {
            TaskDef::Http { url, headers } => {
                required("url", url)?;
                for (name, value) in headers {
                    required(name, value)?;
                }
            }
            TaskDef::LeetcodeStats {
                base_url,
                username,
                submission_limit,
            } => {
                required("base_url", base_url)?;
                required("username", username)?;
                if *submission_limit == 0 {
                    return Err(ConfigError::InvalidTask {
                        task: id.to_string(),
                        message: "'submission_limit' must be at least 1".to_string(),
                    });
                }
            }
            TaskDef::ReportWebhook {
                url,
                source,
                destination,
            } => {
                required("url", url)?;
                required("source", source)?;
                required("destination", destination)?;
            }
        }
        Ok(())
    }
}

/// Build a registry holding one task per definition.
pub fn build_registry(defs: &BTreeMap<String, TaskDef>) -> Result<TaskRegistry, ConfigError> {
    let mut registry = TaskRegistry::new();
    for (id, def) in defs {
        def.validate(id)?;
        match def.clone() {
            TaskDef::Http { url, headers } => {
                registry.register(id, HttpTask::new(&url, headers))?;
            }
            TaskDef::LeetcodeStats {
                base_url,
                username,
                submission_limit,
            } => {
                registry.register(
                    id,
                    LeetcodeStatsTask::new(&base_url, &username, submission_limit),
                )?;
            }
            TaskDef::ReportWebhook {
                url,
                source,
                destination,
            } => {
                registry.register(id, ReportWebhookTask::new(&url, &source, &destination))?;
            }
        }
    }
    Ok(registry)
}

/// Shared HTTP client settings for built-in tasks. The per-attempt timeout
/// is enforced by the invoker; this one only bounds a single request.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
