use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// What happens to a run when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    Fail,
    Continue,
    Retry,
}

impl Default for OnFailure {
    fn default() -> Self {
        OnFailure::Fail
    }
}

/// Backoff configuration for `on_failure: retry` steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Applied on top of `on_failure: retry` once attempts are exhausted:
    /// `false` falls back to `fail`, `true` falls back to `continue`.
    #[serde(default)]
    pub continue_on_exhaustion: bool,
}

fn default_backoff_ms() -> u64 {
    100
}

/// A single step in a [`WorkflowDef`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub unit_type: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub on_failure: OnFailure,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

/// A DAG of steps, registered by id and run against the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    pub steps: Vec<Step>,
    /// Interpolation template evaluated against the final step outputs.
    #[serde(default)]
    pub output: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<unitbus_core::UnitError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepResult {
    pub fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// The mutable record of one execution of a [`WorkflowDef`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: String,
    pub status: RunStatus,
    pub step_results: BTreeMap<String, StepResult>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<unitbus_core::UnitError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl WorkflowRun {
    pub fn new(workflow_id: impl Into<String>, step_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            status: RunStatus::Pending,
            step_results: step_ids.into_iter().map(|id| (id, StepResult::pending())).collect(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            output: None,
        }
    }
}
