use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use unitbus_workflow::{WorkflowRun, WorkflowStore};
use uuid::Uuid;

/// In-memory `WorkflowStore`, the default for processes that don't need
/// execution history to survive a restart.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    runs: RwLock<HashMap<Uuid, WorkflowRun>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create_run(&self, run: WorkflowRun) {
        self.runs.write().await.insert(run.id, run);
    }

    async fn update_run(&self, run: WorkflowRun) {
        self.runs.write().await.insert(run.id, run);
    }

    async fn get_run(&self, id: Uuid) -> Option<WorkflowRun> {
        self.runs.read().await.get(&id).cloned()
    }

    async fn list_runs(&self, workflow_id: &str) -> Vec<WorkflowRun> {
        self.runs
            .read()
            .await
            .values()
            .filter(|run| run.workflow_id == workflow_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_update_replaces_the_same_run_by_id() {
        let store = InMemoryWorkflowStore::new();
        let run = WorkflowRun::new("wf".to_string(), vec!["step".to_string()]);
        let id = run.id;
        store.create_run(run.clone()).await;

        let mut updated = run;
        updated.status = unitbus_workflow::RunStatus::Completed;
        store.update_run(updated).await;

        let fetched = store.get_run(id).await.unwrap();
        assert_eq!(fetched.status, unitbus_workflow::RunStatus::Completed);
    }

    #[tokio::test]
    async fn list_runs_filters_by_workflow_id() {
        let store = InMemoryWorkflowStore::new();
        store
            .create_run(WorkflowRun::new("a".to_string(), vec![]))
            .await;
        store
            .create_run(WorkflowRun::new("b".to_string(), vec![]))
            .await;

        assert_eq!(store.list_runs("a").await.len(), 1);
        assert_eq!(store.list_runs("missing").await.len(), 0);
    }
}
