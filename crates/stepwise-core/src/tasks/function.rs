use std::future::Future;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::Fault;
use crate::workflow::invoker::Task;

/// An in-process task backed by an async closure.
pub struct FnTask {
    f: Box<dyn Fn(Value) -> BoxFuture<'static, Result<Value, Fault>> + Send + Sync>,
}

impl FnTask {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        Self {
            f: Box::new(move |input| f(input).boxed()),
        }
    }
}

#[async_trait]
impl Task for FnTask {
    async fn invoke(&self, input: Value) -> Result<Value, Fault> {
        (self.f)(input).await
    }
}

impl std::fmt::Debug for FnTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnTask")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_closure_sees_input_and_returns_output() {
        let task = FnTask::new(|input: Value| async move {
            Ok(json!({ "statusCode": 200, "body": input["yearDateMonth"].clone() }))
        });
        let out = task.invoke(json!({ "yearDateMonth": "2024-06-01" })).await.unwrap();
        assert_eq!(out, json!({ "statusCode": 200, "body": "2024-06-01" }));
    }

    #[tokio::test]
    async fn test_fault_is_propagated() {
        let task = FnTask::new(|_input| async {
            Err(Fault::Unavailable {
                message: "down".to_string(),
            })
        });
        let err = task.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, Fault::Unavailable { ref message } if message == "down"));
    }
}
