//! `stepwise validate`: Check a workflow file.

use stepwise_core::workflow::engine::describe_rules;
use stepwise_core::workflow::Stage;

use super::load_workflow;

pub fn run(config_path: &str) -> Result<(), String> {
    let workflow = load_workflow(config_path)?;

    println!("✅ {} is valid", config_path);
    println!("   Workflow : {}", workflow.name());
    if let Some(description) = workflow.description() {
        println!("   About    : {}", description);
    }
    match workflow.schedule() {
        Some(schedule) => println!("   Schedule : {}", schedule),
        None => println!("   Schedule : manual only"),
    }
    print_stage("Producer", workflow.producer());
    print_stage("Consumer", workflow.consumer());

    let failure = workflow.failure_signal();
    println!("   On fail  : {} ({})", failure.error, failure.cause);
    Ok(())
}

fn print_stage(label: &str, stage: &Stage) {
    println!(
        "   {:<9}: {} (timeout {}s, {} attempt(s))",
        label,
        stage.task,
        stage.timeout.as_secs(),
        stage.retry.max_attempts
    );
    for rule in describe_rules(stage) {
        println!("              {}", rule);
    }
}
