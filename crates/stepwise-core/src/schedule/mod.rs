//! Scheduler Trigger: fires one workflow execution per scheduled tick.
//!
//! Two cadences are supported:
//!
//! ```yaml
//! schedule:
//!   daily: { at: "08:00" }     # every day at 08:00 UTC
//! # or
//! schedule:
//!   every: { seconds: 3600 }
//! ```
//!
//! Each tick starts its execution on its own tokio task, so a slow
//! execution never delays the next tick and two executions never share
//! state beyond the immutable workflow.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::ConfigError;
use crate::models::execution::WorkflowExecution;
use crate::store::ExecutionStore;
use crate::workflow::Workflow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Every day at `HH:MM` UTC.
    Daily { at: String },
    /// Every `seconds` seconds, starting one interval after the scheduler starts.
    Every { seconds: u64 },
}

impl Schedule {
    pub fn cadence(&self) -> Result<Cadence, ConfigError> {
        match self {
            Schedule::Daily { at } => NaiveTime::parse_from_str(at, "%H:%M")
                .map(Cadence::Daily)
                .map_err(|_| {
                    ConfigError::InvalidSchedule(format!("'{}' is not a HH:MM time", at))
                }),
            Schedule::Every { seconds } => {
                if *seconds == 0 {
                    return Err(ConfigError::InvalidSchedule(
                        "interval must be at least one second".to_string(),
                    ));
                }
                let seconds = i64::try_from(*seconds).map_err(|_| {
                    ConfigError::InvalidSchedule(format!("interval {}s is too large", seconds))
                })?;
                Duration::try_seconds(seconds)
                    .map(Cadence::Every)
                    .ok_or_else(|| {
                        ConfigError::InvalidSchedule(format!("interval {}s is too large", seconds))
                    })
            }
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Daily { at } => write!(f, "daily at {} UTC", at),
            Schedule::Every { seconds } => write!(f, "every {}s", seconds),
        }
    }
}

/// A validated schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily(NaiveTime),
    Every(Duration),
}

impl Cadence {
    /// The first tick strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Daily(at) => {
                let today = now.date_naive().and_time(*at).and_utc();
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
            Cadence::Every(interval) => now + *interval,
        }
    }
}

/// Run one execution for `tick` and archive it.
///
/// Archive failures are logged; they never change the execution outcome.
pub async fn dispatch(
    workflow: Arc<Workflow>,
    store: Option<ExecutionStore>,
    tick: DateTime<Utc>,
) -> WorkflowExecution {
    let execution = WorkflowExecution::start(workflow.name(), tick);
    run_and_archive(workflow, store, execution).await
}

/// Like [`dispatch`], for an execution the caller already started (and
/// whose id it may have handed out).
pub async fn run_and_archive(
    workflow: Arc<Workflow>,
    store: Option<ExecutionStore>,
    execution: WorkflowExecution,
) -> WorkflowExecution {
    let execution = workflow.run(execution).await;
    if let Some(store) = store {
        if let Err(e) = store.archive(&execution).await {
            tracing::error!(
                "[Scheduler] Failed to archive execution {}: {}",
                execution.id,
                e
            );
        }
    }
    execution
}

/// Long-running trigger loop for one workflow.
pub struct Scheduler {
    workflow: Arc<Workflow>,
    cadence: Cadence,
    store: Option<ExecutionStore>,
}

impl Scheduler {
    /// A scheduler driven by the workflow's own `schedule`.
    pub fn new(workflow: Arc<Workflow>, store: Option<ExecutionStore>) -> Result<Self, ConfigError> {
        let cadence = workflow
            .schedule()
            .ok_or_else(|| {
                ConfigError::InvalidSchedule(format!(
                    "workflow '{}' has no schedule",
                    workflow.name()
                ))
            })?
            .cadence()?;
        Ok(Self::with_cadence(workflow, cadence, store))
    }

    pub fn with_cadence(
        workflow: Arc<Workflow>,
        cadence: Cadence,
        store: Option<ExecutionStore>,
    ) -> Self {
        Self {
            workflow,
            cadence,
            store,
        }
    }

    /// Fire executions until `shutdown` flips to `true`, then wait for the
    /// executions still in flight. Returns the number of ticks fired.
    ///
    /// Deadlines are kept on tokio's clock; the wall clock is read once at
    /// start-up and only supplies the tick timestamps.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let started = Utc::now();
        let mut next = self.cadence.next_after(started);
        let mut deadline = Instant::now() + until(started, next);
        let mut in_flight: Vec<JoinHandle<WorkflowExecution>> = Vec::new();
        let mut fired = 0usize;

        tracing::info!(
            "[Scheduler] '{}' scheduled, next tick at {}",
            self.workflow.name(),
            next
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::info!("[Scheduler] Tick {} for '{}'", next, self.workflow.name());
                    in_flight.retain(|handle| !handle.is_finished());
                    in_flight.push(tokio::spawn(dispatch(
                        self.workflow.clone(),
                        self.store.clone(),
                        next,
                    )));
                    fired += 1;

                    // Ticks missed while the process was stalled are skipped, not replayed.
                    let lag = Instant::now().saturating_duration_since(deadline);
                    let now = next + Duration::from_std(lag).unwrap_or_else(|_| Duration::zero());
                    let following = self.cadence.next_after(now);
                    deadline += until(next, following);
                    next = following;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "[Scheduler] Stopping, waiting for {} running execution(s)",
            in_flight.iter().filter(|h| !h.is_finished()).count()
        );
        for handle in in_flight {
            if let Err(e) = handle.await {
                tracing::error!("[Scheduler] Execution task failed: {}", e);
            }
        }
        fired
    }
}

/// Wall-clock distance between two ticks, as a tokio sleep.
fn until(from: DateTime<Utc>, to: DateTime<Utc>) -> std::time::Duration {
    (to - from).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::tasks::FnTask;
    use crate::workflow::{Stage, TaskRegistry};
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_daily_next_after() {
        let cadence = Schedule::Daily { at: "08:00".to_string() }.cadence().unwrap();

        let before = Utc.with_ymd_and_hms(2024, 6, 1, 7, 59, 0).unwrap();
        assert_eq!(
            cadence.next_after(before),
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
        );

        let exactly = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(
            cadence.next_after(exactly),
            Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap()
        );

        let month_end = Utc.with_ymd_and_hms(2024, 6, 30, 23, 0, 0).unwrap();
        assert_eq!(
            cadence.next_after(month_end),
            Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_every_next_after() {
        let cadence = Schedule::Every { seconds: 90 }.cadence().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(
            cadence.next_after(now),
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 1, 30).unwrap()
        );
    }

    #[test]
    fn test_invalid_schedules() {
        assert!(Schedule::Daily { at: "25:00".to_string() }.cadence().is_err());
        assert!(Schedule::Daily { at: "8am".to_string() }.cadence().is_err());
        assert!(Schedule::Every { seconds: 0 }.cadence().is_err());
    }

    #[test]
    fn test_schedule_yaml_shape() {
        use serde_yaml::with::singleton_map_recursive;

        let daily: Schedule = singleton_map_recursive::deserialize(
            serde_yaml::Deserializer::from_str("daily: { at: \"06:30\" }"),
        )
        .unwrap();
        assert_eq!(daily, Schedule::Daily { at: "06:30".to_string() });
        assert_eq!(daily.to_string(), "daily at 06:30 UTC");

        let every: Schedule = singleton_map_recursive::deserialize(
            serde_yaml::Deserializer::from_str("every:\n  seconds: 60\n"),
        )
        .unwrap();
        assert_eq!(every, Schedule::Every { seconds: 60 });
    }

    fn counting_workflow(calls: Arc<AtomicU32>) -> Arc<Workflow> {
        let producer = FnTask::new(move |_input| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!({ "statusCode": 200, "body": {} })) }
        });
        let consumer = FnTask::new(|_input| async { Ok(json!({ "statusCode": 200 })) });
        let mut registry = TaskRegistry::new();
        registry.register("p", producer).unwrap();
        registry.register("c", consumer).unwrap();
        Arc::new(
            Workflow::new(
                "scheduled",
                Stage::producer("p"),
                Stage::consumer("c"),
                Arc::new(registry),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_scheduler_requires_a_schedule() {
        let workflow = counting_workflow(Arc::new(AtomicU32::new(0)));
        assert!(matches!(
            Scheduler::new(workflow, None),
            Err(ConfigError::InvalidSchedule(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_per_tick_and_archives() {
        let calls = Arc::new(AtomicU32::new(0));
        let workflow = counting_workflow(calls.clone());
        let store = ExecutionStore::new(Database::open_in_memory().unwrap());
        let cadence = Schedule::Every { seconds: 60 }.cadence().unwrap();

        let (tx, rx) = watch::channel(false);
        let scheduler = Scheduler::with_cadence(workflow, cadence, Some(store.clone()));
        let handle = tokio::spawn(scheduler.run(rx));

        tokio::time::sleep(std::time::Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        let fired = handle.await.unwrap();

        assert_eq!(fired, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_timestamps_follow_the_cadence() {
        let workflow = counting_workflow(Arc::new(AtomicU32::new(0)));
        let store = ExecutionStore::new(Database::open_in_memory().unwrap());
        let cadence = Schedule::Every { seconds: 60 }.cadence().unwrap();

        let (tx, rx) = watch::channel(false);
        let scheduler = Scheduler::with_cadence(workflow, cadence, Some(store.clone()));
        let handle = tokio::spawn(scheduler.run(rx));

        tokio::time::sleep(std::time::Duration::from_secs(200)).await;
        tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), 3);

        let mut ticks: Vec<_> = store
            .list(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.started_at)
            .collect();
        ticks.sort();
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[1] - ticks[0], Duration::seconds(60));
        assert_eq!(ticks[2] - ticks[1], Duration::seconds(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick_fires_nothing() {
        let calls = Arc::new(AtomicU32::new(0));
        let workflow = counting_workflow(calls.clone());
        let cadence = Schedule::Every { seconds: 3600 }.cadence().unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Scheduler::with_cadence(workflow, cadence, None).run(rx));
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_archives_terminal_execution() {
        let workflow = counting_workflow(Arc::new(AtomicU32::new(0)));
        let store = ExecutionStore::new(Database::open_in_memory().unwrap());
        let tick = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

        let execution = dispatch(workflow, Some(store.clone()), tick).await;
        assert!(execution.succeeded());
        assert_eq!(execution.execution_date, "2024-06-01");
        assert_eq!(store.get(&execution.id).await.unwrap(), Some(execution));
    }
}
