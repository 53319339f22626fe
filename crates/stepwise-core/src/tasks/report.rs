//! Report consumer: renders the stats report and posts it to a webhook.
//!
//! Input: `{ lambda_output, yearDateMonth }`. `lambda_output` is the
//! producer's result document, optionally wrapped as `{ value: ... }`; its
//! `body` may be the stats object or the same object encoded as a string.
//!
//! The webhook receives `{ subject, html, source, destination }`.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Fault;
use crate::tasks::leetcode::LeetcodeStats;
use crate::workflow::invoker::Task;

#[derive(Debug, Serialize)]
struct ReportMessage<'a> {
    subject: String,
    html: String,
    source: &'a str,
    destination: &'a str,
}

pub struct ReportWebhookTask {
    client: reqwest::Client,
    url: String,
    source: String,
    destination: String,
}

impl ReportWebhookTask {
    pub fn new(url: &str, source: &str, destination: &str) -> Self {
        Self {
            client: super::http_client(),
            url: url.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    async fn send(&self, date: &str, input: &Value) -> Result<(), String> {
        let stats = extract_stats(input)?;
        let message = ReportMessage {
            subject: format!("Leetcode Status Report on {}", date),
            html: render_report(&stats),
            source: &self.source,
            destination: &self.destination,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("webhook answered {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl Task for ReportWebhookTask {
    async fn invoke(&self, input: Value) -> Result<Value, Fault> {
        let Some(date) = input.get("yearDateMonth").and_then(Value::as_str) else {
            return Ok(json!({
                "errorType": "InvalidInput",
                "errorMessage": "missing 'yearDateMonth'"
            }));
        };

        match self.send(date, &input).await {
            Ok(()) => {
                tracing::info!("[ReportWebhook] Report for {} sent to {}", date, self.destination);
                Ok(json!({
                    "statusCode": 200,
                    "body": { "message": "Report sent successfully" }
                }))
            }
            Err(error) => {
                tracing::warn!("[ReportWebhook] Report for {} failed: {}", date, error);
                Ok(json!({
                    "statusCode": 500,
                    "body": { "message": "Failed to send report", "error": error }
                }))
            }
        }
    }
}

fn extract_stats(input: &Value) -> Result<LeetcodeStats, String> {
    let output = input
        .get("lambda_output")
        .ok_or_else(|| "missing 'lambda_output'".to_string())?;
    let output = output.get("value").unwrap_or(output);
    let body = output
        .get("body")
        .ok_or_else(|| "producer output has no body".to_string())?;

    let parsed = match body {
        Value::String(encoded) => serde_json::from_str(encoded),
        other => serde_json::from_value(other.clone()),
    };
    parsed.map_err(|e| format!("invalid stats body: {}", e))
}

/// Render the HTML report: a solved summary table and a latest submissions
/// table. Difficulties without a matching total are skipped.
pub fn render_report(stats: &LeetcodeStats) -> String {
    let mut html = String::from(
        "<html>\n<body>\n<h2>Leetcode Status Report</h2>\n<h3>Solved Summary</h3>\n\
         <table border=\"1\" style=\"border-collapse: collapse;\">\n\
         <tr><th>Difficulty</th><th>Solved</th><th>Submissions</th></tr>\n",
    );

    let summary = &stats.solved_summary;
    for solved in &summary.ac_submission_num {
        let total = summary
            .total_submission_num
            .iter()
            .find(|t| t.difficulty == solved.difficulty);
        if let Some(total) = total {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&solved.difficulty),
                solved.count,
                total.submissions
            );
        }
    }

    html.push_str(
        "</table>\n<h3>Latest Submissions</h3>\n\
         <table border=\"1\" style=\"border-collapse: collapse;\">\n\
         <tr><th>Title</th><th>Status</th><th>Language</th><th>Timestamp</th></tr>\n",
    );

    for submission in &stats.latest_submissions.submission {
        let timestamp = match &submission.timestamp {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&submission.title),
            escape_html(&submission.status_display),
            escape_html(&submission.lang),
            escape_html(&timestamp)
        );
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stats_body() -> Value {
        json!({
            "solvedSummary": {
                "acSubmissionNum": [
                    { "difficulty": "Easy", "count": 30, "submissions": 35 },
                    { "difficulty": "Hard", "count": 2, "submissions": 9 }
                ],
                "totalSubmissionNum": [
                    { "difficulty": "Easy", "count": 31, "submissions": 40 }
                ]
            },
            "latestSubmissions": {
                "submission": [{
                    "title": "<Two> Sum",
                    "statusDisplay": "Accepted",
                    "lang": "rust",
                    "timestamp": "1717228800"
                }]
            }
        })
    }

    #[test]
    fn test_render_report_escapes_and_skips_unmatched() {
        let stats: LeetcodeStats = serde_json::from_value(stats_body()).unwrap();
        let html = render_report(&stats);
        assert!(html.contains("<tr><td>Easy</td><td>30</td><td>40</td></tr>"));
        assert!(!html.contains("<td>Hard</td>"));
        assert!(html.contains("&lt;Two&gt; Sum"));
        assert!(html.contains("<td>1717228800</td>"));
    }

    #[test]
    fn test_extract_stats_accepts_wrapped_and_encoded_bodies() {
        let direct = json!({ "lambda_output": { "statusCode": 200, "body": stats_body() } });
        assert!(extract_stats(&direct).is_ok());

        let wrapped = json!({
            "lambda_output": { "value": { "statusCode": 200, "body": stats_body().to_string() } }
        });
        assert!(extract_stats(&wrapped).is_ok());

        let broken = json!({ "lambda_output": { "statusCode": 200, "body": "not json" } });
        assert!(extract_stats(&broken).is_err());
    }

    #[tokio::test]
    async fn test_sends_report_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({
                "subject": "Leetcode Status Report on 2024-06-01",
                "source": "reports@example.com",
                "destination": "me@example.com"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let task = ReportWebhookTask::new(
            &format!("{}/hook", server.uri()),
            "reports@example.com",
            "me@example.com",
        );
        let out = task
            .invoke(json!({
                "lambda_output": { "statusCode": 200, "body": stats_body() },
                "yearDateMonth": "2024-06-01"
            }))
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({ "statusCode": 200, "body": { "message": "Report sent successfully" } })
        );
    }

    #[tokio::test]
    async fn test_webhook_failure_yields_500() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let task = ReportWebhookTask::new(&server.uri(), "a@example.com", "b@example.com");
        let out = task
            .invoke(json!({
                "lambda_output": { "statusCode": 200, "body": stats_body() },
                "yearDateMonth": "2024-06-01"
            }))
            .await
            .unwrap();
        assert_eq!(out["statusCode"], 500);
        assert_eq!(out["body"]["message"], "Failed to send report");
        assert!(out["body"]["error"].as_str().unwrap().contains("400"));
    }

    #[tokio::test]
    async fn test_missing_date_is_a_callee_error() {
        let task = ReportWebhookTask::new("http://127.0.0.1:9/hook", "a@example.com", "b@example.com");
        let out = task.invoke(json!({ "lambda_output": {} })).await.unwrap();
        assert_eq!(out["errorType"], "InvalidInput");
    }
}
