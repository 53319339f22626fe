//! `stepwise schedule`: Run the schedule trigger until interrupted.

use std::sync::Arc;

use stepwise_core::schedule::Scheduler;
use tokio::sync::watch;

use super::{load_workflow, open_store};

pub async fn run(config_path: &str, db_path: &str) -> Result<(), String> {
    let workflow = Arc::new(load_workflow(config_path)?);
    let store = open_store(db_path)?;
    let scheduler = Scheduler::new(workflow.clone(), Some(store)).map_err(|e| e.to_string())?;

    if let Some(schedule) = workflow.schedule() {
        println!("⏰ '{}' scheduled {}", workflow.name(), schedule);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));
    tracing::info!("[CLI] Scheduler started for '{}'", workflow.name());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    tracing::info!("[CLI] Shutdown requested, stopping scheduler");
    let _ = shutdown_tx.send(true);
    let fired = handle
        .await
        .map_err(|e| format!("Scheduler task failed: {}", e))?;
    println!("Fired {} execution(s)", fired);
    Ok(())
}
