use async_trait::async_trait;
use serde_json::Value;
use unitbus_core::{RequestOptions, UnitError};

/// Seam the workflow engine hangs off of. Kept here rather than a dependency
/// on the workflow crate so the dependency direction stays
/// Registry -> Gateway -> Workflow engine: the engine depends on the
/// gateway to dispatch its steps, not the other way around.
#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    async fn run(
        &self,
        workflow_id: &str,
        input: Value,
        options: RequestOptions,
    ) -> Result<Value, UnitError>;
}
