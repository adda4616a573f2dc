use crate::WorkflowRun;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence seam for [`WorkflowRun`]s. The reference implementation
/// (`unitbus-stores`) is in-memory; durable execution state is out of scope.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create_run(&self, run: WorkflowRun);
    async fn update_run(&self, run: WorkflowRun);
    async fn get_run(&self, id: Uuid) -> Option<WorkflowRun>;
    async fn list_runs(&self, workflow_id: &str) -> Vec<WorkflowRun>;
}
