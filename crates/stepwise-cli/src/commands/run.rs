//! `stepwise run`: Run one execution now.

use std::sync::Arc;

use stepwise_core::schedule::dispatch;
use stepwise_core::WorkflowExecution;

use super::{load_workflow, open_store, parse_execution_time, print_json};

/// Run one execution and return it, archiving it when `archive` is set.
pub async fn execute(
    config_path: &str,
    db_path: &str,
    at: Option<&str>,
    archive: bool,
) -> Result<WorkflowExecution, String> {
    let workflow = Arc::new(load_workflow(config_path)?);
    let started_at = parse_execution_time(at)?;
    let store = if archive {
        Some(open_store(db_path)?)
    } else {
        tracing::debug!("[CLI] Archiving disabled for this run");
        None
    };

    println!(
        "▶ Running '{}' for {}",
        workflow.name(),
        started_at.format("%Y-%m-%d")
    );
    Ok(dispatch(workflow, store, started_at).await)
}

pub async fn run(
    config_path: &str,
    db_path: &str,
    at: Option<&str>,
    archive: bool,
) -> Result<(), String> {
    let execution = execute(config_path, db_path, at, archive).await?;

    for step in &execution.history {
        println!(
            "   {:<12} {:<20} attempts: {}",
            step.state.as_str(),
            step.task,
            step.attempts
        );
    }

    if execution.succeeded() {
        println!("✅ Execution {} succeeded", execution.id);
        if let Some(ref output) = execution.output {
            print_json(&output.to_value());
        }
        return Ok(());
    }

    let reason = execution
        .failure_detail
        .as_ref()
        .map(|d| format!("{} at {}", d.message, d.step))
        .unwrap_or_else(|| "unknown failure".to_string());
    Err(format!("Execution {} failed: {}", execution.id, reason))
}
