//! Generic HTTP task: POSTs the input document to an endpoint.
//!
//! If the endpoint answers with a task result document (`statusCode` or
//! `errorType` at the top level) it is passed through unchanged. Any other
//! answer is wrapped as `{ statusCode: <HTTP status>, body: <response> }`.
//! Gateway errors (502/503/504) and connection failures are faults, so the
//! invoker retries them.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::error::Fault;
use crate::workflow::invoker::Task;

pub struct HttpTask {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl HttpTask {
    pub fn new(url: &str, headers: HashMap<String, String>) -> Self {
        Self {
            client: super::http_client(),
            url: url.to_string(),
            headers,
        }
    }
}

#[async_trait]
impl Task for HttpTask {
    async fn invoke(&self, input: Value) -> Result<Value, Fault> {
        let mut request = self.client.post(&self.url).json(&input);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Fault::unavailable(format!("POST {} failed: {}", self.url, e)))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ) {
            return Err(Fault::unavailable(format!("{} answered {}", self.url, status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Fault::unavailable(format!("reading response from {}: {}", self.url, e)))?;

        tracing::debug!("[HttpTask] {} answered {}", self.url, status);

        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        if is_task_result(&body) {
            return Ok(body);
        }
        Ok(json!({ "statusCode": status.as_u16(), "body": body }))
    }
}

fn is_task_result(value: &Value) -> bool {
    value.get("statusCode").is_some() || value.get("errorType").is_some()
}
