use crate::UnitError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// The three points in an execution's lifecycle that emit an event
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Started,
    Completed,
    Failed,
}

/// A structured signal emitted around a unit execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub event_type: EventType,
    pub domain: String,
    pub unit_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UnitError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub correlation_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// A failure while delivering an [`ExecutionEvent`] to a subscriber.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to publish execution event: {0}")]
pub struct PublishError(pub String);

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::Started => "started",
            EventType::Completed => "completed",
            EventType::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A sink for execution events. Implementations back MCP/HTTP adapters,
/// metrics exporters, audit logs, etc.; the gateway and workflow engine only
/// depend on this trait.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: ExecutionEvent) -> Result<(), PublishError>;
}

/// The default publisher: drops every event. Used when no publisher is
/// configured ("tolerates a nil publisher").
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

#[async_trait]
impl EventPublisher for NullPublisher {
    async fn publish(&self, _event: ExecutionEvent) -> Result<(), PublishError> {
        Ok(())
    }
}

/// An in-memory publisher that records every event it receives, for tests
/// that assert on event ordering.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: std::sync::Mutex<Vec<ExecutionEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: ExecutionEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
