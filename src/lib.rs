//! In-process unit dispatch platform: schema validation, a registry of
//! commands/queries/resources, a dispatch gateway, and a DAG workflow
//! engine, wired together behind one entry point.

use std::sync::Arc;
use unitbus_gateway::{Gateway, GatewayOptions};
use unitbus_registry::Registry;
use unitbus_stores::InMemoryWorkflowStore;
use unitbus_workflow::WorkflowEngine;

pub mod prelude {
    pub use crate::{Platform, PlatformBuilder};
    pub use unitbus_core::{
        Command, ErrorCode, Example, ExecutionContext, NullPublisher, Query, RecordingPublisher,
        Request, RequestKind, RequestOptions, Resource, ResourceFactory, ResourceMeta, Response,
        StreamChunk, StreamingCommand, StreamingQuery, UnitError, UnitMeta,
    };
    pub use unitbus_core::{EventPublisher, EventType, ExecutionEvent, PublishError};
    pub use unitbus_gateway::{Gateway, GatewayBuilder, GatewayOptions, WorkflowDispatcher};
    pub use unitbus_registry::{ReadThroughCache, Registry, RegistryError, ResourceOrFactory, UnitHandle};
    pub use unitbus_schema::{
        validate, Field, Schema, SchemaDefError, ToolDescriptor, Violation, ViolationCode,
    };
    pub use unitbus_stores::{InMemoryCrudStore, InMemoryWorkflowStore};
    pub use unitbus_workflow::{
        OnFailure, RetryPolicy, RunStatus, Step, StepResult, StepStatus, WorkflowDef,
        WorkflowEngine, WorkflowEngineError, WorkflowRun, WorkflowStore,
    };
}

/// A fully wired platform instance: a shared [`Registry`], a [`Gateway`]
/// that dispatches through it, and a [`WorkflowEngine`] that runs through
/// that same gateway.
///
/// This is the composition root every other crate in the workspace leaves
/// to its caller: the gateway needs a dispatcher for `workflow` requests
/// before it can be built, and the engine needs a gateway to dispatch its
/// own steps through, so one of them has to be constructed second and
/// patched in. This wires it in the order `Registry -> Gateway ->
/// Workflow engine` and hands back a gateway whose `workflow_dispatcher`
/// is the engine.
pub struct Platform {
    pub registry: Registry,
    pub gateway: Arc<Gateway>,
    pub workflow_engine: Arc<WorkflowEngine>,
}

impl Platform {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> PlatformBuilder {
        PlatformBuilder::default()
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct PlatformBuilder {
    registry: Option<Registry>,
    gateway_options: GatewayOptions,
    max_parallel: Option<usize>,
    workflow_store: Option<Arc<dyn unitbus_workflow::WorkflowStore>>,
}

impl PlatformBuilder {
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn event_publisher(mut self, publisher: Arc<dyn unitbus_core::EventPublisher>) -> Self {
        self.gateway_options.event_publisher = Some(publisher);
        self
    }

    pub fn default_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.gateway_options.default_timeout = timeout;
        self
    }

    pub fn max_parallel_steps(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel);
        self
    }

    pub fn workflow_store(mut self, store: Arc<dyn unitbus_workflow::WorkflowStore>) -> Self {
        self.workflow_store = Some(store);
        self
    }

    pub fn build(self) -> Platform {
        let registry = self.registry.unwrap_or_default();
        let store = self
            .workflow_store
            .unwrap_or_else(|| Arc::new(InMemoryWorkflowStore::new()));

        // The gateway needs a WorkflowDispatcher up front, but the engine
        // needs a Gateway to dispatch its steps through: build the gateway
        // first with no dispatcher, hand it to the engine, then swap it
        // for a second gateway that does have one. Both gateways share the
        // same registry and options, so this is transparent to callers.
        let bootstrap_gateway = Arc::new(Gateway::new(registry.clone(), self.gateway_options.clone()));
        let mut engine = WorkflowEngine::new(registry.clone(), bootstrap_gateway, store);
        if let Some(max_parallel) = self.max_parallel {
            engine = engine.with_max_parallel(max_parallel);
        }
        let engine = Arc::new(engine);

        let mut options = self.gateway_options;
        options.workflow_dispatcher = Some(engine.clone() as Arc<dyn unitbus_gateway::WorkflowDispatcher>);
        let gateway = Arc::new(Gateway::new(registry.clone(), options));

        Platform {
            registry,
            gateway,
            workflow_engine: engine,
        }
    }
}
