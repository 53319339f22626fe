//! LeetCode statistics producer.
//!
//! Calls the public LeetCode stats API:
//! - `GET {base}/{user}/acSubmission?limit=N`: latest accepted submissions
//! - `GET {base}/{user}/solved`: solved-question summary
//!
//! Both answering 200 yields
//! `{ statusCode: 200, body: { solvedSummary, latestSubmissions } }`; anything
//! else yields `{ statusCode: 500, body: { error: "Failed to fetch statistics" } }`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Fault;
use crate::workflow::invoker::Task;

/// Solved/attempted counts per difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedSummary {
    #[serde(default)]
    pub ac_submission_num: Vec<DifficultyCount>,
    #[serde(default)]
    pub total_submission_num: Vec<DifficultyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyCount {
    pub difficulty: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub submissions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestSubmissions {
    #[serde(default)]
    pub submission: Vec<Submission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub title: String,
    pub status_display: String,
    pub lang: String,
    /// The API sends epoch seconds, usually as a string.
    pub timestamp: Value,
}

/// The producer's body, as the report consumer reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeetcodeStats {
    pub solved_summary: SolvedSummary,
    pub latest_submissions: LatestSubmissions,
}

pub struct LeetcodeStatsTask {
    client: reqwest::Client,
    base_url: String,
    username: String,
    submission_limit: u32,
}

impl LeetcodeStatsTask {
    pub fn new(base_url: &str, username: &str, submission_limit: u32) -> Self {
        Self {
            client: super::http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            submission_limit,
        }
    }

    async fn fetch(&self, url: String) -> Option<Value> {
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("[LeetcodeStats] GET {} failed: {}", url, e);
                return None;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            tracing::warn!("[LeetcodeStats] GET {} answered {}", url, response.status());
            return None;
        }
        match response.json::<Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("[LeetcodeStats] GET {} returned invalid JSON: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl Task for LeetcodeStatsTask {
    async fn invoke(&self, _input: Value) -> Result<Value, Fault> {
        let submissions_url = format!(
            "{}/{}/acSubmission?limit={}",
            self.base_url, self.username, self.submission_limit
        );
        let solved_url = format!("{}/{}/solved", self.base_url, self.username);

        let (submissions, solved) =
            tokio::join!(self.fetch(submissions_url), self.fetch(solved_url));

        match (submissions, solved) {
            (Some(latest_submissions), Some(solved_summary)) => Ok(json!({
                "statusCode": 200,
                "body": {
                    "solvedSummary": solved_summary,
                    "latestSubmissions": latest_submissions,
                }
            })),
            _ => Ok(json!({
                "statusCode": 500,
                "body": { "error": "Failed to fetch statistics" }
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn solved() -> Value {
        json!({
            "solvedProblem": 42,
            "acSubmissionNum": [
                { "difficulty": "All", "count": 42, "submissions": 60 },
                { "difficulty": "Easy", "count": 30, "submissions": 35 }
            ],
            "totalSubmissionNum": [
                { "difficulty": "All", "count": 50, "submissions": 90 },
                { "difficulty": "Easy", "count": 31, "submissions": 40 }
            ]
        })
    }

    fn submissions() -> Value {
        json!({
            "count": 1,
            "submission": [{
                "title": "Two Sum",
                "titleSlug": "two-sum",
                "timestamp": "1717228800",
                "statusDisplay": "Accepted",
                "lang": "rust"
            }]
        })
    }

    #[tokio::test]
    async fn test_combines_both_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice/acSubmission"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(submissions()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/alice/solved"))
            .respond_with(ResponseTemplate::new(200).set_body_json(solved()))
            .expect(1)
            .mount(&server)
            .await;

        let task = LeetcodeStatsTask::new(&format!("{}/", server.uri()), "alice", 5);
        let out = task.invoke(json!({ "yearDateMonth": "2024-06-01" })).await.unwrap();

        assert_eq!(out["statusCode"], 200);
        assert_eq!(out["body"]["solvedSummary"], solved());
        assert_eq!(out["body"]["latestSubmissions"], submissions());

        let stats: LeetcodeStats = serde_json::from_value(out["body"].clone()).unwrap();
        assert_eq!(stats.solved_summary.ac_submission_num[1].count, 30);
        assert_eq!(stats.latest_submissions.submission[0].title, "Two Sum");
    }

    #[tokio::test]
    async fn test_any_failed_request_yields_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice/acSubmission"))
            .respond_with(ResponseTemplate::new(200).set_body_json(submissions()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/alice/solved"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let task = LeetcodeStatsTask::new(&server.uri(), "alice", 10);
        let out = task.invoke(json!({})).await.unwrap();
        assert_eq!(
            out,
            json!({ "statusCode": 500, "body": { "error": "Failed to fetch statistics" } })
        );
    }
}
