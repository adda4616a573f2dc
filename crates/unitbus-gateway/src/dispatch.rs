use crate::GatewayOptions;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use unitbus_core::{
    ErrorCode, ExecutionContext, Request, RequestKind, Response, StreamChunk, UnitError,
};
use unitbus_registry::{Registry, ResourceOrFactory};
use unitbus_schema::Schema;
use uuid::Uuid;

/// The single entry point that turns a [`Request`] into a [`Response`], or,
/// for units with a streaming capability, a [`StreamChunk`] stream.
///
/// Stateless beyond its registry handle and default options: all per-request
/// state (correlation id, deadline, cancellation) is local to the call.
pub struct Gateway {
    registry: Registry,
    options: GatewayOptions,
}

impl Gateway {
    pub fn new(registry: Registry, options: GatewayOptions) -> Self {
        Self { registry, options }
    }

    pub fn builder(registry: Registry) -> crate::GatewayBuilder {
        crate::GatewayBuilder::new(registry)
    }

    #[tracing::instrument(skip(self, request), fields(unit = %request.unit, kind = ?request.kind, correlation_id))]
    pub async fn dispatch(&self, request: Request) -> Response {
        let correlation_id = Uuid::new_v4();
        tracing::Span::current().record("correlation_id", tracing::field::display(correlation_id));
        let start = Instant::now();

        let output = self.dispatch_inner(&request, correlation_id).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match output {
            Ok(value) => {
                tracing::info!(duration_ms, "dispatch completed");
                Response::ok(value, correlation_id, duration_ms)
            }
            Err(error) => {
                tracing::warn!(duration_ms, error = %error.code, "dispatch failed");
                Response::err(error, correlation_id, duration_ms)
            }
        }
    }

    async fn dispatch_inner(&self, request: &Request, correlation_id: Uuid) -> Result<Value, UnitError> {
        match request.kind {
            RequestKind::Command => self.dispatch_command(request, correlation_id).await,
            RequestKind::Query => self.dispatch_query(request, correlation_id).await,
            RequestKind::Resource => self.dispatch_resource(request).await,
            RequestKind::Workflow => self.dispatch_workflow(request).await,
        }
    }

    async fn dispatch_command(&self, request: &Request, correlation_id: Uuid) -> Result<Value, UnitError> {
        let cmd = self
            .registry
            .get_command(&request.unit)
            .await
            .ok_or_else(|| unit_not_found(&request.unit))?;

        validate_against(cmd.input_schema(), &request.input)?;

        let ctx = self.build_context(cmd.domain(), cmd.name(), request, correlation_id);
        let timeout = self.effective_timeout(request);

        ctx.publish_started(&request.input).await;
        let input = request.input.clone();
        let result = run_isolated(timeout, ctx.cancellation_token(), {
            let ctx = ctx.clone();
            async move { cmd.execute(&ctx, input).await }
        })
        .await;
        self.publish_terminal(&ctx, &result).await;
        result
    }

    async fn dispatch_query(&self, request: &Request, correlation_id: Uuid) -> Result<Value, UnitError> {
        let query = self
            .registry
            .get_query(&request.unit)
            .await
            .ok_or_else(|| unit_not_found(&request.unit))?;

        validate_against(query.input_schema(), &request.input)?;

        let ctx = self.build_context(query.domain(), query.name(), request, correlation_id);
        let timeout = self.effective_timeout(request);

        ctx.publish_started(&request.input).await;
        let input = request.input.clone();
        let result = run_isolated(timeout, ctx.cancellation_token(), {
            let ctx = ctx.clone();
            async move { query.execute(&ctx, input).await }
        })
        .await;
        self.publish_terminal(&ctx, &result).await;
        result
    }

    async fn dispatch_resource(&self, request: &Request) -> Result<Value, UnitError> {
        match self.registry.get_resource_with_factory(&request.unit).await {
            Some(ResourceOrFactory::Resource(resource)) => {
                let ctx = ExecutionContext::new(resource.domain(), request.unit.clone());
                resource.get(&ctx).await
            }
            Some(ResourceOrFactory::Factory(factory)) => {
                let resource = factory.create(&request.unit).await?;
                let ctx = ExecutionContext::new(resource.domain(), request.unit.clone());
                resource.get(&ctx).await
            }
            None => Err(UnitError::from_code(
                ErrorCode::ResourceNotFound,
                format!("no resource or factory resolves '{}'", request.unit),
            )),
        }
    }

    async fn dispatch_workflow(&self, request: &Request) -> Result<Value, UnitError> {
        let dispatcher = self.options.workflow_dispatcher.as_ref().ok_or_else(|| {
            UnitError::from_code(
                ErrorCode::InvalidRequest,
                "no workflow dispatcher configured on this gateway",
            )
        })?;
        dispatcher
            .run(&request.unit, request.input.clone(), request.options.clone())
            .await
    }

    /// Resolve a unit's streaming capability and hand back its chunk stream
    /// directly, after the same validation and context setup as a regular
    /// dispatch. Cancelling the returned context's token closes the stream;
    /// the stream is guaranteed to terminate with exactly one terminal
    /// chunk.
    pub async fn dispatch_stream(&self, request: Request) -> Result<BoxStream<'static, StreamChunk>, UnitError> {
        match request.kind {
            RequestKind::Command => {
                let unit = self
                    .registry
                    .get_streaming_command(&request.unit)
                    .await
                    .ok_or_else(|| unit_not_found(&request.unit))?;
                let meta = self
                    .registry
                    .get_command(&request.unit)
                    .await
                    .ok_or_else(|| unit_not_found(&request.unit))?;
                validate_against(meta.input_schema(), &request.input)?;
                let ctx = self.build_context(meta.domain(), meta.name(), &request, Uuid::new_v4());
                Ok(unit.execute_stream(&ctx, request.input).await)
            }
            RequestKind::Query => {
                let unit = self
                    .registry
                    .get_streaming_query(&request.unit)
                    .await
                    .ok_or_else(|| unit_not_found(&request.unit))?;
                let meta = self
                    .registry
                    .get_query(&request.unit)
                    .await
                    .ok_or_else(|| unit_not_found(&request.unit))?;
                validate_against(meta.input_schema(), &request.input)?;
                let ctx = self.build_context(meta.domain(), meta.name(), &request, Uuid::new_v4());
                Ok(unit.execute_stream(&ctx, request.input).await)
            }
            _ => Err(UnitError::from_code(
                ErrorCode::InvalidRequest,
                "streaming is only supported for commands and queries",
            )),
        }
    }

    fn build_context(
        &self,
        domain: &str,
        unit_name: &str,
        request: &Request,
        correlation_id: Uuid,
    ) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(domain, unit_name);
        ctx.correlation_id = correlation_id;
        if let Some(trace_id) = &request.trace_id {
            ctx = ctx.with_trace_id(trace_id.clone());
        }
        if let Some(publisher) = &self.options.event_publisher {
            ctx = ctx.with_publisher(publisher.clone());
        }
        ctx
    }

    fn effective_timeout(&self, request: &Request) -> std::time::Duration {
        if request.options.timeout_ms > 0 {
            request.options.timeout()
        } else {
            self.options.default_timeout
        }
    }

    async fn publish_terminal(&self, ctx: &ExecutionContext, result: &Result<Value, UnitError>) {
        match result {
            Ok(output) => ctx.publish_completed(output).await,
            Err(error) => ctx.publish_failed(error).await,
        }
    }
}

fn unit_not_found(name: &str) -> UnitError {
    UnitError::from_code(ErrorCode::UnitNotFound, format!("no unit registered as '{name}'"))
}

fn validate_against(schema: &Schema, value: &Value) -> Result<(), UnitError> {
    let violations = unitbus_schema::validate(schema, value);
    if violations.is_empty() {
        return Ok(());
    }
    let details = serde_json::to_value(&violations).unwrap_or(Value::Null);
    Err(UnitError::from_code(ErrorCode::ValidationFailed, "input failed schema validation")
        .with_details(details))
}

/// Runs `fut` under a deadline, converting a timeout into
/// `timeout_exceeded` and any panic inside `fut` into `panic_recovered`
/// rather than letting it unwind out of the dispatcher and take the host
/// process down with it.
async fn run_isolated<F>(
    timeout: std::time::Duration,
    cancellation: tokio_util::sync::CancellationToken,
    fut: F,
) -> Result<Value, UnitError>
where
    F: std::future::Future<Output = Result<Value, UnitError>> + Send + 'static,
{
    let handle = tokio::spawn(fut);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            let message = panic_message(join_err);
            tracing::error!(error = %message, "unit panicked; isolated by the gateway");
            Err(UnitError::from_code(ErrorCode::PanicRecovered, message))
        }
        Err(_elapsed) => {
            cancellation.cancel();
            Err(UnitError::from_code(
                ErrorCode::TimeoutExceeded,
                format!("execution exceeded {}ms", timeout.as_millis()),
            ))
        }
    }
}

fn panic_message(join_err: tokio::task::JoinError) -> String {
    if join_err.is_cancelled() {
        return "execution was cancelled".to_string();
    }
    match join_err.into_panic().downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&str>() {
            Ok(msg) => msg.to_string(),
            Err(_) => "unit panicked".to_string(),
        },
    }
}

/// Wraps a single, already-computed value as a one-chunk stream, for units
/// that expose streaming but only ever produce a single result.
pub fn single_chunk_stream(data: Value) -> BoxStream<'static, StreamChunk> {
    stream::iter(vec![StreamChunk::data(0, data), StreamChunk::end(1)]).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use unitbus_core::{Command, NullPublisher, Query, RequestOptions, UnitMeta};
    use unitbus_registry::Registry;

    struct Echo {
        input: Schema,
        output: Schema,
    }

    impl Echo {
        fn new() -> Self {
            let schema = Schema::object(BTreeMap::new(), vec!["value".to_string()])
                .property("value", Schema::string());
            Self {
                input: schema.clone(),
                output: schema,
            }
        }
    }

    impl UnitMeta for Echo {
        fn name(&self) -> &str {
            "echo.noop"
        }
        fn domain(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "returns its input"
        }
        fn input_schema(&self) -> &Schema {
            &self.input
        }
        fn output_schema(&self) -> &Schema {
            &self.output
        }
    }

    #[async_trait]
    impl Command for Echo {
        async fn execute(&self, _ctx: &ExecutionContext, input: Value) -> Result<Value, UnitError> {
            Ok(input)
        }
    }

    #[async_trait]
    impl Query for Echo {
        async fn execute(&self, _ctx: &ExecutionContext, input: Value) -> Result<Value, UnitError> {
            Ok(input)
        }
    }

    struct Panics(Schema);

    impl UnitMeta for Panics {
        fn name(&self) -> &str {
            "boom.panic"
        }
        fn domain(&self) -> &str {
            "boom"
        }
        fn description(&self) -> &str {
            "always panics"
        }
        fn input_schema(&self) -> &Schema {
            &self.0
        }
        fn output_schema(&self) -> &Schema {
            &self.0
        }
    }

    #[async_trait]
    impl Command for Panics {
        async fn execute(&self, _ctx: &ExecutionContext, _input: Value) -> Result<Value, UnitError> {
            panic!("simulated unit bug");
        }
    }

    struct Sleeps(Schema);

    impl UnitMeta for Sleeps {
        fn name(&self) -> &str {
            "slow.sleep"
        }
        fn domain(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps longer than its budget"
        }
        fn input_schema(&self) -> &Schema {
            &self.0
        }
        fn output_schema(&self) -> &Schema {
            &self.0
        }
    }

    #[async_trait]
    impl Command for Sleeps {
        async fn execute(&self, _ctx: &ExecutionContext, _input: Value) -> Result<Value, UnitError> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    async fn gateway_with(registry: Registry) -> Gateway {
        Gateway::new(registry, GatewayOptions::default())
    }

    #[tokio::test]
    async fn happy_path_command_dispatch_returns_output() {
        let registry = Registry::new();
        registry.register_command(Arc::new(Echo::new())).await.unwrap();
        let gateway = gateway_with(registry).await;

        let response = gateway
            .dispatch(Request::new(
                RequestKind::Command,
                "echo.noop",
                json!({"value": "hi"}),
            ))
            .await;

        assert!(response.is_ok());
        assert_eq!(response.output, Some(json!({"value": "hi"})));
    }

    #[tokio::test]
    async fn invalid_input_yields_validation_failed_with_details() {
        let registry = Registry::new();
        registry.register_command(Arc::new(Echo::new())).await.unwrap();
        let gateway = gateway_with(registry).await;

        let response = gateway
            .dispatch(Request::new(RequestKind::Command, "echo.noop", json!({})))
            .await;

        assert!(!response.is_ok());
        let error = response.error.unwrap();
        assert_eq!(error.code, "validation_failed");
        assert!(error.details.is_some());
    }

    #[tokio::test]
    async fn unknown_unit_yields_unit_not_found() {
        let gateway = gateway_with(Registry::new()).await;
        let response = gateway
            .dispatch(Request::new(RequestKind::Command, "missing.thing", json!({})))
            .await;
        assert_eq!(response.error.unwrap().code, "unit_not_found");
    }

    #[tokio::test]
    async fn panicking_unit_is_isolated_as_panic_recovered() {
        let registry = Registry::new();
        registry
            .register_command(Arc::new(Panics(Schema::null())))
            .await
            .unwrap();
        let gateway = gateway_with(registry).await;

        let response = gateway
            .dispatch(Request::new(RequestKind::Command, "boom.panic", Value::Null))
            .await;

        assert_eq!(response.error.unwrap().code, "panic_recovered");
    }

    #[tokio::test]
    async fn slow_unit_is_cut_off_by_the_timeout_budget() {
        let registry = Registry::new();
        registry
            .register_command(Arc::new(Sleeps(Schema::null())))
            .await
            .unwrap();
        let gateway = gateway_with(registry).await;

        let response = gateway
            .dispatch(Request::new(
                RequestKind::Command,
                "slow.sleep",
                Value::Null,
            )
            .with_options(RequestOptions {
                timeout_ms: 20,
                stream: false,
            }))
            .await;

        assert_eq!(response.error.unwrap().code, "timeout_exceeded");
    }

    #[tokio::test]
    async fn query_dispatch_shares_the_same_validation_and_context_path() {
        let registry = Registry::new();
        registry.register_query(Arc::new(Echo::new())).await.unwrap();
        let gateway = gateway_with(registry).await;

        let response = gateway
            .dispatch(Request::new(
                RequestKind::Query,
                "echo.noop",
                json!({"value": "ok"}),
            ))
            .await;

        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn event_publisher_observes_started_and_terminal_events() {
        let publisher = Arc::new(unitbus_core::RecordingPublisher::new());
        let registry = Registry::new();
        registry.register_command(Arc::new(Echo::new())).await.unwrap();
        let gateway = Gateway::new(
            registry,
            GatewayOptions {
                event_publisher: Some(publisher.clone()),
                ..GatewayOptions::default()
            },
        );

        gateway
            .dispatch(Request::new(
                RequestKind::Command,
                "echo.noop",
                json!({"value": "hi"}),
            ))
            .await;

        let events = publisher.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, unitbus_core::EventType::Started);
        assert_eq!(events[1].event_type, unitbus_core::EventType::Completed);
        let _ = NullPublisher;
    }
}
