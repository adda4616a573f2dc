use crate::{EventPublisher, EventType, ExecutionEvent, NullPublisher, UnitError};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Bound once per command/query execution. Carries the correlation id used to
/// tie `started`/`completed`/`failed` events together, the execution
/// deadline (via cancellation), and the event sink.
#[derive(Clone)]
pub struct ExecutionContext {
    pub correlation_id: Uuid,
    pub domain: String,
    pub unit_name: String,
    pub trace_id: Option<String>,
    started_at: Instant,
    publisher: Arc<dyn EventPublisher>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(domain: impl Into<String>, unit_name: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            domain: domain.into(),
            unit_name: unit_name.into(),
            trace_id: None,
            started_at: Instant::now(),
            publisher: Arc::new(NullPublisher),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Emit a `started` event. Errors from the publisher are logged, never
    /// propagated.
    pub async fn publish_started(&self, input: &Value) {
        self.publish(EventType::Started, Some(input.clone()), None, None, false)
            .await;
    }

    pub async fn publish_completed(&self, output: &Value) {
        self.publish(EventType::Completed, None, Some(output.clone()), None, true)
            .await;
    }

    pub async fn publish_failed(&self, error: &UnitError) {
        self.publish(EventType::Failed, None, None, Some(error.clone()), true)
            .await;
    }

    async fn publish(
        &self,
        event_type: EventType,
        input: Option<Value>,
        output: Option<Value>,
        error: Option<UnitError>,
        terminal: bool,
    ) {
        let event = ExecutionEvent {
            event_type,
            domain: self.domain.clone(),
            unit_name: self.unit_name.clone(),
            input,
            output,
            error,
            duration_ms: terminal.then(|| self.elapsed_ms()),
            correlation_id: self.correlation_id,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.publisher.publish(event).await {
            tracing::warn!(
                correlation_id = %self.correlation_id,
                unit = %self.unit_name,
                error = %e,
                "event publish failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingPublisher;
    use serde_json::json;

    #[tokio::test]
    async fn started_then_completed_are_correlated_and_ordered() {
        let publisher = Arc::new(RecordingPublisher::new());
        let ctx = ExecutionContext::new("echo", "echo.noop").with_publisher(publisher.clone());

        ctx.publish_started(&json!({"value": "hi"})).await;
        ctx.publish_completed(&json!({"value": "hi"})).await;

        let events = publisher.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::Started);
        assert_eq!(events[1].event_type, EventType::Completed);
        assert_eq!(events[0].correlation_id, events[1].correlation_id);
        assert!(events[0].duration_ms.is_none());
        assert!(events[1].duration_ms.is_some());
    }

    #[tokio::test]
    async fn nil_publisher_never_fails_the_host_operation() {
        let ctx = ExecutionContext::new("echo", "echo.noop");
        ctx.publish_started(&json!({})).await;
        ctx.publish_failed(&UnitError::new("boom", "boom")).await;
    }

    #[tokio::test]
    async fn cancellation_propagates_through_clones() {
        let ctx = ExecutionContext::new("echo", "echo.noop");
        let token = ctx.cancellation_token();
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
