//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses the
//! stepwise-core domain logic.

pub mod history;
pub mod run;
pub mod schedule;
pub mod server;
pub mod validate;

use chrono::{DateTime, NaiveDate, Utc};
use stepwise_core::{Database, ExecutionStore, TaskRegistry, Workflow, WorkflowDefinition};

/// Load and validate the workflow file.
pub fn load_workflow(config_path: &str) -> Result<Workflow, String> {
    let def = WorkflowDefinition::from_file(config_path).map_err(|e| e.to_string())?;
    Workflow::from_definition(&def, TaskRegistry::new())
        .map_err(|e| format!("Invalid workflow '{}': {}", config_path, e))
}

/// Open the execution archive at the given SQLite path.
pub fn open_store(db_path: &str) -> Result<ExecutionStore, String> {
    let db = Database::open(db_path)
        .map_err(|e| format!("Failed to open database '{}': {}", db_path, e))?;
    Ok(ExecutionStore::new(db))
}

/// Parse `--at`: RFC 3339, or a bare `YYYY-MM-DD` meaning midnight UTC.
pub fn parse_execution_time(raw: Option<&str>) -> Result<DateTime<Utc>, String> {
    let Some(raw) = raw else {
        return Ok(Utc::now());
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| format!("Invalid execution time '{}': expected RFC 3339 or YYYY-MM-DD", raw))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
