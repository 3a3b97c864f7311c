//! SQLite flow run repository.
//!
//! `start_data` and `end_data` are stored as JSON text. Timestamps are RFC 3339
//! strings, so ordering by `created_at` is chronological; the UUIDv7 id breaks
//! ties within the same instant.

use chrono::{DateTime, Utc};
use flowrun_core::repository::flow_run::FlowRunRepository;
use flowrun_types::error::RepositoryError;
use flowrun_types::run::{FlowRun, FlowRunStatus};
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::pool::DatabasePool;

const RUN_COLUMNS: &str =
    "id, flow_id, start_data, end_data, status, error, created_at, updated_at";

/// SQLite-backed implementation of `FlowRunRepository`.
pub struct SqliteFlowRunRepository {
    pool: DatabasePool,
}

impl SqliteFlowRunRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct FlowRunRow {
    id: String,
    flow_id: Option<String>,
    start_data: Option<String>,
    end_data: Option<String>,
    status: String,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl FlowRunRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            flow_id: row.try_get("flow_id")?,
            start_data: row.try_get("start_data")?,
            end_data: row.try_get("end_data")?,
            status: row.try_get("status")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_run(self) -> Result<FlowRun, RepositoryError> {
        let status: FlowRunStatus = self.status.parse().map_err(RepositoryError::Query)?;

        Ok(FlowRun {
            id: parse_uuid(&self.id)?,
            flow_id: self.flow_id,
            start_data: self.start_data.as_deref().map(parse_json).transpose()?,
            end_data: self.end_data.as_deref().map(parse_json).transpose()?,
            status,
            error: self.error,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_json(s: &str) -> Result<Value, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid JSON column: {e}")))
}

fn to_json(value: &Value) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Query(format!("serialize JSON: {e}")))
}

fn rows_into_runs(rows: Vec<SqliteRow>) -> Result<Vec<FlowRun>, RepositoryError> {
    rows.iter()
        .map(|row| {
            FlowRunRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_run()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// FlowRunRepository impl
// ---------------------------------------------------------------------------

impl FlowRunRepository for SqliteFlowRunRepository {
    async fn create_run(&self, run: &FlowRun) -> Result<(), RepositoryError> {
        let start_data = run.start_data.as_ref().map(to_json).transpose()?;
        let end_data = run.end_data.as_ref().map(to_json).transpose()?;

        sqlx::query(
            r#"INSERT INTO flow_runs (id, flow_id, start_data, end_data, status, error, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.id.to_string())
        .bind(&run.flow_id)
        .bind(&start_data)
        .bind(&end_data)
        .bind(run.status.as_str())
        .bind(&run.error)
        .bind(format_datetime(&run.created_at))
        .bind(format_datetime(&run.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn finish_run(
        &self,
        id: &Uuid,
        status: FlowRunStatus,
        end_data: &Value,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE flow_runs SET status = ?, end_data = ?, error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(to_json(end_data)?)
        .bind(error)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_run(&self, id: &Uuid) -> Result<Option<FlowRun>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {RUN_COLUMNS} FROM flow_runs WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = FlowRunRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_run()?))
            }
            None => Ok(None),
        }
    }

    async fn list_runs_by_flow(
        &self,
        flow_id: &str,
        limit: u32,
    ) -> Result<Vec<FlowRun>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM flow_runs WHERE flow_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(flow_id)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_into_runs(rows)
    }

    async fn list_recent_runs(&self, limit: u32) -> Result<Vec<FlowRun>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM flow_runs ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_into_runs(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn sample_run(flow_id: &str) -> FlowRun {
        FlowRun::started(Some(flow_id.to_string()), Some(json!({ "n": 1 })))
    }

    #[tokio::test]
    async fn test_create_and_get_run() {
        let repo = SqliteFlowRunRepository::new(test_pool().await);
        let run = sample_run("flow-a");
        repo.create_run(&run).await.unwrap();

        let loaded = repo.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.flow_id.as_deref(), Some("flow-a"));
        assert_eq!(loaded.start_data, Some(json!({ "n": 1 })));
        assert_eq!(loaded.end_data, None);
        assert_eq!(loaded.status, FlowRunStatus::Running);
        assert!(loaded.error.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_run_is_none() {
        let repo = SqliteFlowRunRepository::new(test_pool().await);
        assert!(repo.get_run(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_run_success() {
        let repo = SqliteFlowRunRepository::new(test_pool().await);
        let run = sample_run("flow-a");
        repo.create_run(&run).await.unwrap();

        repo.finish_run(&run.id, FlowRunStatus::Success, &json!({ "n": 10 }), None)
            .await
            .unwrap();

        let loaded = repo.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, FlowRunStatus::Success);
        assert_eq!(loaded.end_data, Some(json!({ "n": 10 })));
        assert!(loaded.updated_at >= loaded.created_at);
    }

    #[tokio::test]
    async fn test_finish_run_failure_keeps_message() {
        let repo = SqliteFlowRunRepository::new(test_pool().await);
        let run = sample_run("flow-a");
        repo.create_run(&run).await.unwrap();

        repo.finish_run(&run.id, FlowRunStatus::Failed, &json!({}), Some("No start node found"))
            .await
            .unwrap();

        let loaded = repo.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, FlowRunStatus::Failed);
        assert_eq!(loaded.end_data, Some(json!({})));
        assert_eq!(loaded.error.as_deref(), Some("No start node found"));
    }

    #[tokio::test]
    async fn test_finish_unknown_run_is_not_found() {
        let repo = SqliteFlowRunRepository::new(test_pool().await);
        let err = repo
            .finish_run(&Uuid::now_v7(), FlowRunStatus::Success, &json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_run_without_flow_id() {
        let repo = SqliteFlowRunRepository::new(test_pool().await);
        let run = FlowRun::started(None, None);
        repo.create_run(&run).await.unwrap();

        let loaded = repo.get_run(&run.id).await.unwrap().unwrap();
        assert!(loaded.flow_id.is_none());
        assert!(loaded.start_data.is_none());
    }

    #[tokio::test]
    async fn test_list_runs_newest_first() {
        let repo = SqliteFlowRunRepository::new(test_pool().await);
        let first = sample_run("flow-a");
        let second = sample_run("flow-a");
        let other = sample_run("flow-b");
        repo.create_run(&first).await.unwrap();
        repo.create_run(&second).await.unwrap();
        repo.create_run(&other).await.unwrap();

        let by_flow = repo.list_runs_by_flow("flow-a", 10).await.unwrap();
        let ids: Vec<Uuid> = by_flow.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let recent = repo.list_recent_runs(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, other.id);

        assert!(repo.list_runs_by_flow("missing", 10).await.unwrap().is_empty());
    }
}
