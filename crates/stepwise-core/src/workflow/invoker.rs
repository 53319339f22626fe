//! Task Invoker: runs one task invocation with a timeout and retry policy.
//!
//! A task is anything that accepts an input document and answers with a raw
//! output document or a [`Fault`]. The invoker:
//! 1. Bounds every attempt by the invocation timeout
//! 2. Parses the raw output into a [`TaskResult`]
//! 3. Retries faults (and callee errors listed in `retry_on`) with backoff
//! 4. Never retries malformed output or terminal callee errors

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Fault, InvokeError};
use crate::models::task::{TaskInvocation, TaskResult};
use crate::workflow::registry::TaskRegistry;

/// Capability interface implemented by every callable unit of work.
#[async_trait]
pub trait Task: Send + Sync {
    /// Run the task with the given input document.
    ///
    /// Return `Err` only for infrastructure faults. Failures the task
    /// detects itself belong in the output, e.g.
    /// `{ "statusCode": 500, "body": { "error": "..." } }`.
    async fn invoke(&self, input: Value) -> Result<Value, Fault>;
}

/// Result of one invocation, including how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub attempts: u32,
    pub outcome: Result<TaskResult, InvokeError>,
}

/// Stateless invoker over a task registry.
#[derive(Clone)]
pub struct TaskInvoker {
    registry: Arc<TaskRegistry>,
}

impl TaskInvoker {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Invoke the target task, retrying transient failures.
    pub async fn invoke(&self, invocation: &TaskInvocation) -> Invocation {
        let target = invocation.target.as_str();
        let Some(task) = self.registry.get(target) else {
            // Workflows resolve their targets at construction; this only
            // happens when the invoker is used directly.
            return Invocation {
                attempts: 0,
                outcome: Err(InvokeError::Fault {
                    target: target.to_string(),
                    fault: Fault::unavailable(format!("no task registered as '{}'", target)),
                }),
            };
        };

        let policy = &invocation.retry;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                "[Invoker] Invoking '{}' (attempt {}/{})",
                target,
                attempt,
                policy.max_attempts
            );

            let outcome = self.attempt(task.as_ref(), invocation).await;

            let retriable = match &outcome {
                Ok(result) => result
                    .error
                    .as_ref()
                    .is_some_and(|e| policy.retries_error_kind(&e.kind)),
                Err(InvokeError::Fault { .. }) => true,
                Err(InvokeError::ClassificationMismatch { .. }) => false,
            };

            if !retriable || attempt >= policy.max_attempts {
                if let Err(ref e) = outcome {
                    tracing::warn!("[Invoker] {} (after {} attempt(s))", e, attempt);
                }
                return Invocation {
                    attempts: attempt,
                    outcome,
                };
            }

            let delay = policy.delay_after(attempt);
            tracing::warn!(
                "[Invoker] Attempt {}/{} of '{}' failed, retrying in {}ms",
                attempt,
                policy.max_attempts,
                target,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(
        &self,
        task: &dyn Task,
        invocation: &TaskInvocation,
    ) -> Result<TaskResult, InvokeError> {
        let target = &invocation.target;
        let raw = match tokio::time::timeout(invocation.timeout, task.invoke(invocation.input.clone()))
            .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(fault)) => {
                return Err(InvokeError::Fault {
                    target: target.clone(),
                    fault,
                })
            }
            // The pending call is dropped here; whatever it already did stays done.
            Err(_) => {
                return Err(InvokeError::Fault {
                    target: target.clone(),
                    fault: Fault::Timeout {
                        after_ms: invocation.timeout.as_millis() as u64,
                    },
                })
            }
        };

        TaskResult::from_value(raw).map_err(|reason| InvokeError::ClassificationMismatch {
            target: target.clone(),
            reason,
        })
    }
}
