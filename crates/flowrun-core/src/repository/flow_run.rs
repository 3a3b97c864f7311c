//! Flow run repository trait definition.

use flowrun_types::error::RepositoryError;
use flowrun_types::run::{FlowRun, FlowRunStatus};
use serde_json::Value;
use uuid::Uuid;

/// Storage for run records.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait FlowRunRepository: Send + Sync {
    /// Insert a new run record.
    fn create_run(
        &self,
        run: &FlowRun,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Record the outcome of a run and bump `updated_at`.
    ///
    /// Returns `RepositoryError::NotFound` if no run has this id.
    fn finish_run(
        &self,
        id: &Uuid,
        status: FlowRunStatus,
        end_data: &Value,
        error: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_run(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<FlowRun>, RepositoryError>> + Send;

    /// Runs of one flow, newest first.
    fn list_runs_by_flow(
        &self,
        flow_id: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<FlowRun>, RepositoryError>> + Send;

    /// Most recent runs across all flows, newest first.
    fn list_recent_runs(
        &self,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<FlowRun>, RepositoryError>> + Send;
}
