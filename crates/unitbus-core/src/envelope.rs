use crate::UnitError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

fn default_timeout_ms() -> u64 {
    30_000
}

/// What kind of addressable thing `Request::unit` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Command,
    Query,
    Resource,
    Workflow,
}

/// Caller-supplied knobs for a single dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub stream: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            stream: false,
        }
    }
}

impl RequestOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The wire-shaped request the gateway accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub unit: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub options: RequestOptions,
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl Request {
    pub fn new(kind: RequestKind, unit: impl Into<String>, input: Value) -> Self {
        Self {
            kind,
            unit: unit.into(),
            input,
            options: RequestOptions::default(),
            trace_id: None,
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Metadata attached to every [`Response`], regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub correlation_id: Uuid,
    pub duration_ms: u64,
}

/// The wire-shaped result of a dispatch. Exactly one of `output`
/// or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UnitError>,
    pub meta: ResponseMeta,
}

impl Response {
    pub fn ok(output: Value, correlation_id: Uuid, duration_ms: u64) -> Self {
        Self {
            output: Some(output),
            error: None,
            meta: ResponseMeta {
                correlation_id,
                duration_ms,
            },
        }
    }

    pub fn err(error: UnitError, correlation_id: Uuid, duration_ms: u64) -> Self {
        Self {
            output: None,
            error: Some(error),
            meta: ResponseMeta {
                correlation_id,
                duration_ms,
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A single chunk of a streamed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub sequence: u64,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<UnitError>,
}

impl StreamChunk {
    pub fn data(sequence: u64, data: Value) -> Self {
        Self {
            sequence,
            data,
            metadata: None,
            done: false,
            error: None,
        }
    }

    /// Attach side-channel metadata (token counts, chunk timing, ...) to an
    /// otherwise-built chunk.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn end(sequence: u64) -> Self {
        Self {
            sequence,
            data: Value::Null,
            metadata: None,
            done: true,
            error: None,
        }
    }

    pub fn failed(sequence: u64, error: UnitError) -> Self {
        Self {
            sequence,
            data: Value::Null,
            metadata: None,
            done: true,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_options_default_to_thirty_second_timeout_and_no_streaming() {
        let opts = RequestOptions::default();
        assert_eq!(opts.timeout_ms, 30_000);
        assert!(!opts.stream);
    }

    #[test]
    fn response_ok_and_err_are_mutually_exclusive() {
        let id = Uuid::new_v4();
        let ok = Response::ok(Value::Null, id, 1);
        assert!(ok.is_ok());
        let err = Response::err(UnitError::new("boom", "boom"), id, 1);
        assert!(!err.is_ok());
    }

    #[test]
    fn deserializing_a_request_without_options_falls_back_to_defaults() {
        let req: Request =
            serde_json::from_str(r#"{"type": "query", "unit": "echo.noop", "input": {}}"#)
                .unwrap();
        assert_eq!(req.options.timeout_ms, 30_000);
    }
}
