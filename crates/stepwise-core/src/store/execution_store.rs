use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::StoreError;
use crate::models::execution::WorkflowExecution;

/// Archive of finished executions. Only terminal executions are accepted;
/// a running execution is never visible here.
#[derive(Clone)]
pub struct ExecutionStore {
    db: Database,
}

impl ExecutionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Archive a terminal execution. Archiving the same execution twice
    /// overwrites the earlier record.
    pub async fn archive(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        if !execution.is_terminal() {
            return Err(StoreError::NotTerminal(execution.id.clone()));
        }

        let record = serde_json::to_string(execution)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let ex = execution.clone();
        let archived_at = Utc::now().timestamp_millis();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO executions (id, workflow, state, execution_date, \
                     started_at, archived_at, error, cause, record) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        ex.id,
                        ex.workflow,
                        ex.state.as_str(),
                        ex.execution_date,
                        ex.started_at.timestamp_millis(),
                        archived_at,
                        ex.failure.as_ref().map(|f| f.error.clone()),
                        ex.failure.as_ref().map(|f| f.cause.clone()),
                        record,
                    ],
                )?;
                Ok(())
            })
            .await?;

        tracing::debug!("[Store] Archived execution {} ({})", execution.id, execution.state);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<WorkflowExecution>, StoreError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT record FROM executions WHERE id = ?1",
                    rusqlite::params![id],
                    row_to_execution,
                )
                .optional()
            })
            .await
    }

    /// Most recent executions first.
    pub async fn list(&self, limit: usize) -> Result<Vec<WorkflowExecution>, StoreError> {
        let limit = limit as i64;
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT record FROM executions ORDER BY started_at DESC, archived_at DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![limit], row_to_execution)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.db
            .with_conn_async(|conn| {
                conn.query_row("SELECT COUNT(*) FROM executions", [], |row| {
                    row.get::<_, i64>(0)
                })
            })
            .await
            .map(|n| n as usize)
    }
}

fn row_to_execution(row: &rusqlite::Row<'_>) -> Result<WorkflowExecution, rusqlite::Error> {
    let record: String = row.get(0)?;
    serde_json::from_str(&record).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}
