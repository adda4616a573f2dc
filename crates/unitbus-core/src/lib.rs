mod context;
mod envelope;
mod error;
mod event;
mod unit;

pub use context::ExecutionContext;
pub use envelope::{Request, RequestKind, RequestOptions, Response, ResponseMeta, StreamChunk};
pub use error::{ErrorCode, UnitError};
pub use event::{EventPublisher, EventType, ExecutionEvent, NullPublisher, PublishError, RecordingPublisher};
pub use unit::{
    Command, Example, Query, Resource, ResourceFactory, ResourceMeta, StreamingCommand,
    StreamingQuery, UnitMeta,
};
