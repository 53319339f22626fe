//! `stepwise history` / `stepwise show`: Query the execution archive.

use super::{open_store, print_json};

pub async fn list(db_path: &str, limit: usize) -> Result<(), String> {
    let store = open_store(db_path)?;
    let executions = store.list(limit).await.map_err(|e| e.to_string())?;

    if executions.is_empty() {
        println!("No archived executions.");
        return Ok(());
    }

    println!("{:<36}  {:<10}  {:<8}  WORKFLOW", "ID", "DATE", "STATE");
    for execution in &executions {
        println!(
            "{:<36}  {:<10}  {:<8}  {}",
            execution.id,
            execution.execution_date,
            execution.state.as_str(),
            execution.workflow
        );
    }
    Ok(())
}

pub async fn show(db_path: &str, id: &str) -> Result<(), String> {
    let store = open_store(db_path)?;
    match store.get(id).await.map_err(|e| e.to_string())? {
        Some(execution) => {
            let value = serde_json::to_value(&execution).map_err(|e| e.to_string())?;
            print_json(&value);
            Ok(())
        }
        None => Err(format!("Execution {} not found", id)),
    }
}
