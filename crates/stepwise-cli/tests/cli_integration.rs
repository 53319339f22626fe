//! Integration tests for the stepwise-cli commands.
//!
//! These tests exercise the same code paths as the binary against a
//! workflow file in a temp directory, mock HTTP tasks and a throwaway
//! SQLite archive.

use std::path::PathBuf;

use serde_json::json;
use stepwise_cli::commands;
use stepwise_core::ExecutionState;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    _dir: TempDir,
    config: String,
    db: String,
}

fn write_workflow(base: &str) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let yaml = format!(
        r#"
name: "cli-report"
description: "Fetch then send"
schedule:
  every:
    seconds: 3600
tasks:
  produce:
    type: http
    url: "{base}/produce"
  consume:
    type: http
    url: "{base}/consume"
producer:
  task: produce
  timeout_secs: 5
consumer:
  task: consume
  timeout_secs: 5
"#
    );
    let config: PathBuf = dir.path().join("workflow.yaml");
    std::fs::write(&config, yaml).expect("write workflow");
    let db = dir.path().join("stepwise.db");
    Fixture {
        config: config.to_string_lossy().into_owned(),
        db: db.to_string_lossy().into_owned(),
        _dir: dir,
    }
}

async fn mount(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[test]
fn test_validate_accepts_well_formed_workflow() {
    let fixture = write_workflow("http://127.0.0.1:9");
    assert!(commands::validate::run(&fixture.config).is_ok());
}

#[test]
fn test_validate_rejects_unknown_task() {
    let fixture = write_workflow("http://127.0.0.1:9");
    let broken = std::fs::read_to_string(&fixture.config)
        .unwrap()
        .replace("task: consume", "task: missing");
    std::fs::write(&fixture.config, broken).unwrap();

    let err = commands::validate::run(&fixture.config).unwrap_err();
    assert!(err.contains("missing"), "unexpected error: {err}");
}

#[test]
fn test_validate_reports_missing_file() {
    assert!(commands::validate::run("/nonexistent/workflow.yaml").is_err());
}

#[tokio::test]
async fn test_run_archives_successful_execution() {
    let server = MockServer::start().await;
    mount(&server, "/produce", json!({ "statusCode": 200, "body": { "solved": 3 } })).await;
    mount(&server, "/consume", json!({ "statusCode": 200, "body": { "sent": true } })).await;
    let fixture = write_workflow(&server.uri());

    let execution =
        commands::run::execute(&fixture.config, &fixture.db, Some("2024-06-01"), true)
            .await
            .unwrap();
    assert_eq!(execution.state, ExecutionState::Succeed);
    assert_eq!(execution.execution_date, "2024-06-01");

    let store = commands::open_store(&fixture.db).unwrap();
    let archived = store.get(&execution.id).await.unwrap().expect("archived");
    assert_eq!(archived, execution);

    assert!(commands::history::list(&fixture.db, 10).await.is_ok());
    assert!(commands::history::show(&fixture.db, &execution.id).await.is_ok());
}

#[tokio::test]
async fn test_run_reports_failure_with_detail() {
    let server = MockServer::start().await;
    mount(&server, "/produce", json!({ "statusCode": 500, "body": "boom" })).await;
    let fixture = write_workflow(&server.uri());

    let err = commands::run::run(&fixture.config, &fixture.db, Some("2024-06-01"), true)
        .await
        .unwrap_err();
    assert!(err.contains("failed"), "unexpected error: {err}");

    let store = commands::open_store(&fixture.db).unwrap();
    let executions = store.list(10).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].state, ExecutionState::Fail);
    assert!(!executions[0].ran(ExecutionState::RunConsumer));
}

#[tokio::test]
async fn test_run_without_archive_leaves_store_empty() {
    let server = MockServer::start().await;
    mount(&server, "/produce", json!({ "statusCode": 200, "body": {} })).await;
    mount(&server, "/consume", json!({ "statusCode": 200, "body": {} })).await;
    let fixture = write_workflow(&server.uri());

    let execution = commands::run::execute(&fixture.config, &fixture.db, None, false)
        .await
        .unwrap();
    assert!(execution.succeeded());

    let store = commands::open_store(&fixture.db).unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_show_unknown_execution_is_an_error() {
    let fixture = write_workflow("http://127.0.0.1:9");
    let err = commands::history::show(&fixture.db, "no-such-id")
        .await
        .unwrap_err();
    assert!(err.contains("not found"));
}

#[tokio::test]
async fn test_run_rejects_bad_execution_time() {
    let fixture = write_workflow("http://127.0.0.1:9");
    let err = commands::run::execute(&fixture.config, &fixture.db, Some("tomorrow"), false)
        .await
        .unwrap_err();
    assert!(err.contains("Invalid execution time"));
}
