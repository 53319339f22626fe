//! Workflow Engine: drives one execution from `Start` to `Succeed` or `Fail`.
//!
//! The engine:
//! 1. Invokes the producer with `{ yearDateMonth }`
//! 2. Classifies the producer result
//! 3. Invokes the consumer with `{ lambda_output, yearDateMonth }`
//! 4. Classifies the consumer result
//!
//! Runtime faults never escape: every one of them ends the execution in
//! `Fail` with the workflow's fixed failure signal, and the original reason
//! is kept in [`FailureDetail`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::{ConfigError, Fault, InvokeError};
use crate::models::execution::{
    ExecutionState, FailureDetail, FailureKind, FailureSignal, StepOutcome, StepRecord,
    WorkflowExecution,
};
use crate::models::task::{RetryPolicy, TaskInvocation, TaskResult};
use crate::schedule::Schedule;
use crate::tasks::build_registry;
use crate::workflow::classifier::{ChoiceRules, TransitionRule};
use crate::workflow::invoker::TaskInvoker;
use crate::workflow::registry::TaskRegistry;
use crate::workflow::schema::{StageDefinition, WorkflowDefinition};

const PRODUCER_TARGETS: &[ExecutionState] = &[ExecutionState::RunConsumer, ExecutionState::Fail];
const CONSUMER_TARGETS: &[ExecutionState] = &[ExecutionState::Succeed, ExecutionState::Fail];

/// A resolved stage: task id, timeout, retry policy and choice point.
#[derive(Debug, Clone)]
pub struct Stage {
    pub task: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub choices: ChoiceRules,
}

impl Stage {
    /// A stage with a 300s timeout, no retries and the default choices.
    pub fn producer(task: &str) -> Self {
        Self {
            task: task.to_string(),
            timeout: Duration::from_secs(300),
            retry: RetryPolicy::none(),
            choices: ChoiceRules::success_on_200("producer", ExecutionState::RunConsumer),
        }
    }

    pub fn consumer(task: &str) -> Self {
        Self {
            choices: ChoiceRules::success_on_200("consumer", ExecutionState::Succeed),
            ..Self::producer(task)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_choices(mut self, choices: ChoiceRules) -> Self {
        self.choices = choices;
        self
    }

    fn from_definition(
        name: &str,
        def: &StageDefinition,
        on_success: ExecutionState,
        allowed: &[ExecutionState],
    ) -> Result<Self, ConfigError> {
        let choices = match &def.choices {
            Some(choices) => ChoiceRules::new(
                name,
                choices.rules.clone(),
                choices.default,
                allowed,
            )?,
            None => ChoiceRules::success_on_200(name, on_success),
        };
        Ok(Self {
            task: def.task.clone(),
            timeout: Duration::from_secs(def.timeout_secs),
            retry: def.retry.clone(),
            choices,
        })
    }

    fn validate(
        &self,
        name: &str,
        registry: &TaskRegistry,
        allowed: &[ExecutionState],
    ) -> Result<(), ConfigError> {
        if !registry.contains(&self.task) {
            return Err(ConfigError::UnknownTask {
                stage: name.to_string(),
                task: self.task.clone(),
            });
        }
        self.retry
            .validate()
            .map_err(|message| ConfigError::InvalidRetry {
                stage: name.to_string(),
                message,
            })?;
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidRetry {
                stage: name.to_string(),
                message: "timeout must be greater than zero".to_string(),
            });
        }
        // Re-check targets: ChoiceRules may have been built for another choice point.
        ChoiceRules::new(
            name,
            self.choices.rules().to_vec(),
            Some(self.choices.default_target()),
            allowed,
        )?;
        Ok(())
    }
}

/// A validated, immutable workflow. Share it behind an `Arc`; executions
/// never mutate it.
#[derive(Clone)]
pub struct Workflow {
    name: String,
    description: Option<String>,
    schedule: Option<Schedule>,
    producer: Stage,
    consumer: Stage,
    failure: FailureSignal,
    invoker: TaskInvoker,
}

impl Workflow {
    /// Build a workflow from resolved stages. Every stage task must be
    /// registered and every choice target must be legal for its stage.
    pub fn new(
        name: &str,
        producer: Stage,
        consumer: Stage,
        registry: Arc<TaskRegistry>,
    ) -> Result<Self, ConfigError> {
        producer.validate("producer", &registry, PRODUCER_TARGETS)?;
        consumer.validate("consumer", &registry, CONSUMER_TARGETS)?;

        Ok(Self {
            name: name.to_string(),
            description: None,
            schedule: None,
            producer,
            consumer,
            failure: FailureSignal::default(),
            invoker: TaskInvoker::new(registry),
        })
    }

    /// Build a workflow from its YAML definition. The tasks declared in the
    /// definition are added to `registry`, which may already hold
    /// in-process tasks.
    pub fn from_definition(
        def: &WorkflowDefinition,
        mut registry: TaskRegistry,
    ) -> Result<Self, ConfigError> {
        let declared = build_registry(&def.tasks)?;
        for id in declared.ids() {
            if let Some(task) = declared.get(&id) {
                registry.register_arc(&id, task)?;
            }
        }

        if let Some(ref schedule) = def.schedule {
            schedule.cadence()?;
        }

        let producer = Stage::from_definition(
            "producer",
            &def.producer,
            ExecutionState::RunConsumer,
            PRODUCER_TARGETS,
        )?;
        let consumer = Stage::from_definition(
            "consumer",
            &def.consumer,
            ExecutionState::Succeed,
            CONSUMER_TARGETS,
        )?;

        let mut workflow = Self::new(&def.name, producer, consumer, Arc::new(registry))?;
        workflow.description = def.description.clone();
        workflow.schedule = def.schedule.clone();
        workflow.failure = def.failure.clone();
        Ok(workflow)
    }

    pub fn with_failure_signal(mut self, failure: FailureSignal) -> Self {
        self.failure = failure;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn producer(&self) -> &Stage {
        &self.producer
    }

    pub fn consumer(&self) -> &Stage {
        &self.consumer
    }

    pub fn failure_signal(&self) -> &FailureSignal {
        &self.failure
    }

    /// Start a fresh execution at `started_at` and run it to completion.
    pub async fn execute(&self, started_at: DateTime<Utc>) -> WorkflowExecution {
        self.run(WorkflowExecution::start(&self.name, started_at))
            .await
    }

    /// Drive an execution until it reaches a terminal state. Results of
    /// earlier steps are taken from the execution's history, so a
    /// partially-run execution continues where it stopped.
    pub async fn run(&self, mut execution: WorkflowExecution) -> WorkflowExecution {
        if execution.is_terminal() {
            return execution;
        }
        tracing::info!(
            "[Engine] Execution {} of '{}' for {} starting at {}",
            execution.id,
            self.name,
            execution.execution_date,
            execution.state
        );

        while !execution.is_terminal() {
            let next = match execution.state {
                ExecutionState::Start => ExecutionState::RunProducer,
                ExecutionState::RunProducer => {
                    let input = json!({ "yearDateMonth": execution.execution_date });
                    self.run_stage(&mut execution, ExecutionState::RunProducer, input)
                        .await
                }
                ExecutionState::ClassifyProducer => {
                    self.classify_stage(&mut execution, ExecutionState::RunProducer)
                }
                ExecutionState::RunConsumer => {
                    match last_result(&execution, ExecutionState::RunProducer) {
                        Some(producer) => {
                            let input = json!({
                                "lambda_output": producer.to_value(),
                                "yearDateMonth": execution.execution_date,
                            });
                            self.run_stage(&mut execution, ExecutionState::RunConsumer, input)
                                .await
                        }
                        None => self.fail(
                            &mut execution,
                            ExecutionState::RunConsumer,
                            FailureKind::ClassificationMismatch,
                            "no producer result recorded".to_string(),
                        ),
                    }
                }
                ExecutionState::ClassifyConsumer => {
                    self.classify_stage(&mut execution, ExecutionState::RunConsumer)
                }
                ExecutionState::Succeed | ExecutionState::Fail => break,
            };

            if let Err(e) = execution.advance(next) {
                tracing::error!("[Engine] Execution {}: {}", execution.id, e);
                let step = execution.state;
                let forced = self.fail(
                    &mut execution,
                    step,
                    FailureKind::Rejected,
                    e.to_string(),
                );
                execution.state = forced;
            }
        }

        if execution.succeeded() {
            execution.output = last_result(&execution, ExecutionState::RunConsumer).cloned();
            tracing::info!("[Engine] Execution {} succeeded", execution.id);
        } else if let Some(ref detail) = execution.failure_detail {
            tracing::warn!(
                "[Engine] Execution {} failed at {} ({:?}): {}",
                execution.id,
                detail.step,
                detail.kind,
                detail.message
            );
        }
        execution
    }

    fn stage(&self, state: ExecutionState) -> &Stage {
        match state {
            ExecutionState::RunConsumer | ExecutionState::ClassifyConsumer => &self.consumer,
            _ => &self.producer,
        }
    }

    /// Invoke the stage's task, record the step and pick the next state.
    async fn run_stage(
        &self,
        execution: &mut WorkflowExecution,
        state: ExecutionState,
        input: Value,
    ) -> ExecutionState {
        let stage = self.stage(state);
        let invocation = TaskInvocation {
            target: stage.task.clone(),
            input: input.clone(),
            timeout: stage.timeout,
            retry: stage.retry.clone(),
        };
        let result = self.invoker.invoke(&invocation).await;

        let (outcome, failure) = match result.outcome {
            Ok(result) => (StepOutcome::Completed { result }, None),
            Err(InvokeError::Fault { target, fault }) => {
                let kind = match &fault {
                    Fault::Timeout { .. } => FailureKind::Timeout,
                    Fault::Unavailable { .. } => FailureKind::Unavailable,
                };
                let message = format!("Task '{}' {}", target, fault);
                (StepOutcome::Faulted { fault }, Some((kind, message)))
            }
            Err(InvokeError::ClassificationMismatch { target, reason }) => {
                let message = format!("Task '{}' returned a malformed result: {}", target, reason);
                (
                    StepOutcome::Malformed { reason },
                    Some((FailureKind::ClassificationMismatch, message)),
                )
            }
        };

        execution.record(StepRecord {
            state,
            task: stage.task.clone(),
            input,
            attempts: result.attempts,
            outcome,
        });

        match failure {
            None => match state {
                ExecutionState::RunProducer => ExecutionState::ClassifyProducer,
                _ => ExecutionState::ClassifyConsumer,
            },
            Some((kind, message)) => self.fail(execution, state, kind, message),
        }
    }

    fn classify_stage(
        &self,
        execution: &mut WorkflowExecution,
        ran: ExecutionState,
    ) -> ExecutionState {
        let classify_state = execution.state;
        let stage = self.stage(ran);
        let Some(result) = last_result(execution, ran) else {
            return self.fail(
                execution,
                classify_state,
                FailureKind::ClassificationMismatch,
                format!("no result recorded for {}", ran),
            );
        };

        let next = stage.choices.classify(result);
        if next == ExecutionState::Fail {
            let message = match result.error {
                Some(ref error) => format!(
                    "Task '{}' returned statusCode {} ({}: {})",
                    stage.task, result.status_code, error.kind, error.message
                ),
                None => format!(
                    "Task '{}' returned statusCode {}",
                    stage.task, result.status_code
                ),
            };
            return self.fail(execution, classify_state, FailureKind::Rejected, message);
        }
        next
    }

    /// Stamp the failure signal and detail; returns `Fail` for the caller to
    /// transition into.
    fn fail(
        &self,
        execution: &mut WorkflowExecution,
        step: ExecutionState,
        kind: FailureKind,
        message: String,
    ) -> ExecutionState {
        execution.failure = Some(self.failure.clone());
        execution.failure_detail = Some(FailureDetail {
            step,
            kind,
            message,
        });
        ExecutionState::Fail
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("producer", &self.producer.task)
            .field("consumer", &self.consumer.task)
            .field("schedule", &self.schedule)
            .finish()
    }
}

fn last_result(execution: &WorkflowExecution, state: ExecutionState) -> Option<&TaskResult> {
    execution
        .history
        .iter()
        .rev()
        .find(|step| step.state == state)
        .and_then(|step| match step.outcome {
            StepOutcome::Completed { ref result } => Some(result),
            _ => None,
        })
}

/// Rules as declared for a stage, for display by the CLI.
pub fn describe_rules(stage: &Stage) -> Vec<String> {
    let mut lines: Vec<String> = stage
        .choices
        .rules()
        .iter()
        .map(|TransitionRule { when, next }| {
            format!(
                "{} → {}",
                serde_json::to_string(when).unwrap_or_else(|_| "?".to_string()),
                next
            )
        })
        .collect();
    lines.push(format!("default → {}", stage.choices.default_target()));
    lines
}
