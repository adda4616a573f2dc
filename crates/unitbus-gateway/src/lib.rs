//! Request dispatch engine: resolution, validation, timeout budget, panic
//! isolation, event emission, and streaming mode.

mod dispatch;
mod options;
mod workflow_dispatch;

pub use dispatch::{single_chunk_stream, Gateway};
pub use options::{GatewayBuilder, GatewayOptions};
pub use workflow_dispatch::WorkflowDispatcher;
