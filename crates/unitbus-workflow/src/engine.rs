use crate::graph::build_plan;
use crate::interpolate::{interpolate, EvalContext};
use crate::store::WorkflowStore;
use crate::types::{OnFailure, RunStatus, Step, StepResult, StepStatus, WorkflowDef, WorkflowRun};
use crate::WorkflowEngineError;
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use unitbus_core::{ErrorCode, Request, RequestKind, RequestOptions, UnitError};
use unitbus_gateway::{Gateway, WorkflowDispatcher};
use unitbus_registry::{Registry, UnitHandle};
use uuid::Uuid;

/// A DAG executor that runs registered units as workflow steps.
///
/// Step dispatch goes through the [`Gateway`] so validation, timeouts, the
/// panic guard and event emission apply uniformly to every step, the same
/// as a direct command or query call.
pub struct WorkflowEngine {
    registry: Registry,
    gateway: Arc<Gateway>,
    store: Arc<dyn WorkflowStore>,
    defs: RwLock<IndexMap<String, WorkflowDef>>,
    run_tokens: RwLock<HashMap<Uuid, CancellationToken>>,
    max_parallel: usize,
}

impl WorkflowEngine {
    pub fn new(registry: Registry, gateway: Arc<Gateway>, store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            registry,
            gateway,
            store,
            defs: RwLock::new(IndexMap::new()),
            run_tokens: RwLock::new(HashMap::new()),
            max_parallel: 1,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub async fn register_workflow(&self, def: WorkflowDef) -> Result<(), WorkflowEngineError> {
        let mut defs = self.defs.write().await;
        if defs.contains_key(&def.id) {
            return Err(WorkflowEngineError::AlreadyExists(def.id));
        }
        defs.insert(def.id.clone(), def);
        Ok(())
    }

    pub async fn cancel(&self, run_id: Uuid) -> Result<(), WorkflowEngineError> {
        let tokens = self.run_tokens.read().await;
        match tokens.get(&run_id) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(WorkflowEngineError::NotFound(run_id.to_string())),
        }
    }

    #[tracing::instrument(skip(self, input), fields(workflow_id = %workflow_id, run_id))]
    pub async fn run(&self, workflow_id: &str, input: Value) -> Result<WorkflowRun, UnitError> {
        let def = self
            .defs
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| {
                UnitError::from_code(ErrorCode::StepNotFound, format!("workflow '{workflow_id}' is not registered"))
            })?;

        let plan = build_plan(&def, &self.registry).await?;

        let step_ids: Vec<String> = def.steps.iter().map(|s| s.id.clone()).collect();
        let mut run = WorkflowRun::new(def.id.clone(), step_ids);
        run.status = RunStatus::Running;
        tracing::Span::current().record("run_id", tracing::field::display(run.id));
        self.store.create_run(run.clone()).await;

        let token = CancellationToken::new();
        self.run_tokens.write().await.insert(run.id, token.clone());

        tracing::info!("workflow run started");
        self.execute(&def, &plan, &mut run, &input, token.clone()).await;

        self.run_tokens.write().await.remove(&run.id);
        run.completed_at = Some(Utc::now());
        self.store.update_run(run.clone()).await;
        match run.status {
            RunStatus::Completed => tracing::info!("workflow run completed"),
            RunStatus::Failed => tracing::warn!(error = ?run.error, "workflow run failed"),
            RunStatus::Cancelled => tracing::info!("workflow run cancelled"),
            RunStatus::Pending | RunStatus::Running => {}
        }
        Ok(run)
    }

    async fn execute(
        &self,
        def: &WorkflowDef,
        plan: &crate::graph::ExecutionPlan,
        run: &mut WorkflowRun,
        input: &Value,
        token: CancellationToken,
    ) {
        let mut remaining_indegree = plan.indegree.clone();
        let mut ready: VecDeque<String> = plan
            .order
            .iter()
            .filter(|id| remaining_indegree[*id] == 0)
            .cloned()
            .collect();

        let mut outputs: BTreeMap<String, Value> = BTreeMap::new();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.max_parallel));
        let mut in_flight: JoinSet<(String, Result<Value, UnitError>)> = JoinSet::new();
        let mut scheduled: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut failed_hard = false;

        loop {
            if token.is_cancelled() {
                run.status = RunStatus::Cancelled;
                break;
            }

            while let Some(step_id) = ready.pop_front() {
                if !scheduled.insert(step_id.clone()) {
                    continue;
                }
                let step = plan.steps.get(&step_id).cloned().unwrap();
                let ctx = EvalContext {
                    input,
                    config: &serde_json::to_value(&def.config).unwrap_or(Value::Null),
                    steps: &outputs,
                };
                let interpolated = match interpolate(&step.input, &ctx) {
                    Ok(v) => v,
                    Err(e) => {
                        run.step_results.insert(
                            step_id.clone(),
                            StepResult {
                                status: StepStatus::Failed,
                                output: None,
                                error: Some(e.clone()),
                                started_at: Some(Utc::now()),
                                completed_at: Some(Utc::now()),
                            },
                        );
                        if step.on_failure == OnFailure::Fail {
                            run.status = RunStatus::Failed;
                            run.error = Some(e);
                            failed_hard = true;
                            token.cancel();
                        }
                        continue;
                    }
                };

                let gateway = self.gateway.clone();
                let registry = self.registry.clone();
                let permit = semaphore.clone();
                let step_token = token.clone();
                in_flight.spawn(async move {
                    let _permit = permit.acquire_owned().await.ok();
                    let outcome = dispatch_step(&gateway, &registry, &step, interpolated, step_token).await;
                    (step.id.clone(), outcome)
                });
            }

            if in_flight.is_empty() {
                break;
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let (step_id, outcome) = match joined {
                Ok(pair) => pair,
                Err(_join_err) => continue,
            };

            let step = plan.steps.get(&step_id).cloned().unwrap();
            let now = Utc::now();

            match outcome {
                Ok(output) => {
                    outputs.insert(step_id.clone(), output.clone());
                    run.step_results.insert(
                        step_id.clone(),
                        StepResult {
                            status: StepStatus::Completed,
                            output: Some(output),
                            error: None,
                            started_at: Some(now),
                            completed_at: Some(now),
                        },
                    );
                }
                Err(error) => {
                    run.step_results.insert(
                        step_id.clone(),
                        StepResult {
                            status: StepStatus::Failed,
                            output: None,
                            error: Some(error.clone()),
                            started_at: Some(now),
                            completed_at: Some(now),
                        },
                    );
                    let falls_back_to_fail = match step.on_failure {
                        OnFailure::Fail => true,
                        OnFailure::Continue => false,
                        // dispatch_step already exhausted the configured attempts;
                        // continue_on_exhaustion decides the landing behavior.
                        OnFailure::Retry => !step
                            .retry
                            .as_ref()
                            .map(|r| r.continue_on_exhaustion)
                            .unwrap_or(false),
                    };

                    if falls_back_to_fail {
                        run.status = RunStatus::Failed;
                        run.error = Some(error);
                        failed_hard = true;
                        token.cancel();
                    } else {
                        outputs.insert(step_id.clone(), Value::Null);
                    }
                }
            }

            if failed_hard {
                break;
            }

            for dependent in &plan.dependents[&step_id] {
                let entry = remaining_indegree.get_mut(dependent).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    ready.push_back(dependent.clone());
                }
            }
        }

        while in_flight.join_next().await.is_some() {}

        if !failed_hard && run.status != RunStatus::Cancelled {
            run.status = RunStatus::Completed;
            let ctx = EvalContext {
                input,
                config: &serde_json::to_value(&def.config).unwrap_or(Value::Null),
                steps: &outputs,
            };
            run.output = interpolate(&def.output, &ctx).ok();
        }
    }
}

async fn dispatch_step(
    gateway: &Gateway,
    registry: &Registry,
    step: &Step,
    input: Value,
    token: CancellationToken,
) -> Result<Value, UnitError> {
    let kind = match registry.get(&step.unit_type).await {
        Some(UnitHandle::Command(_)) => RequestKind::Command,
        Some(UnitHandle::Query(_)) => RequestKind::Query,
        None => {
            return Err(UnitError::from_code(
                ErrorCode::StepNotFound,
                format!("unit '{}' vanished from the registry mid-run", step.unit_type),
            ))
        }
    };

    let attempts = step
        .retry
        .as_ref()
        .map(|r| r.max_attempts.max(1))
        .unwrap_or(1);
    let backoff = step.retry.as_ref().map(|r| r.backoff_ms).unwrap_or(0);

    let mut last_err = None;
    for attempt in 0..attempts {
        if token.is_cancelled() {
            return Err(UnitError::from_code(ErrorCode::Cancelled, "run was cancelled"));
        }
        let request = Request::new(kind, step.unit_type.clone(), input.clone())
            .with_options(RequestOptions::default());
        let response = gateway.dispatch(request).await;
        if response.is_ok() {
            return Ok(response.output.unwrap_or(Value::Null));
        }
        last_err = response.error;
        if attempt + 1 < attempts && backoff > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
        }
    }
    Err(last_err.unwrap_or_else(|| UnitError::from_code(ErrorCode::InternalError, "step failed with no error recorded")))
}

#[async_trait]
impl WorkflowDispatcher for WorkflowEngine {
    async fn run(&self, workflow_id: &str, input: Value, _options: RequestOptions) -> Result<Value, UnitError> {
        let run = WorkflowEngine::run(self, workflow_id, input).await?;
        match run.status {
            RunStatus::Completed => Ok(run.output.unwrap_or(Value::Null)),
            _ => Err(run
                .error
                .unwrap_or_else(|| UnitError::from_code(ErrorCode::InternalError, "workflow run did not complete"))),
        }
    }
}
