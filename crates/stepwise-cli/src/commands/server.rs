//! `stepwise server`: Start the Stepwise HTTP server.

use std::sync::Arc;

use stepwise_core::schedule::Scheduler;
use tokio::sync::watch;

use super::load_workflow;

pub async fn run(
    config_path: &str,
    db_path: &str,
    host: String,
    port: u16,
    with_scheduler: bool,
) -> Result<(), String> {
    let workflow = Arc::new(load_workflow(config_path)?);
    let config = stepwise_server::ServerConfig {
        host,
        port,
        db_path: db_path.to_string(),
    };
    let state = stepwise_server::create_app_state(workflow.clone(), &config.db_path)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if with_scheduler {
        let scheduler = Scheduler::new(workflow.clone(), Some(state.store.clone()))
            .map_err(|e| e.to_string())?;
        tracing::info!("[CLI] Running scheduler alongside the server");
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        None
    };

    println!("Starting Stepwise server on {}:{}...", config.host, config.port);

    let addr = stepwise_server::start_server_with_state(config, state).await?;
    println!("Stepwise server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    if let Some(handle) = scheduler {
        let _ = shutdown_tx.send(true);
        let _ = handle.await;
    }
    Ok(())
}
