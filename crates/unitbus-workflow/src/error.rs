/// Failures registering or looking up a [`crate::WorkflowDef`] itself, as
/// distinct from failures inside a run (those surface as
/// [`unitbus_core::UnitError`] on the run).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowEngineError {
    #[error("workflow '{0}' is already registered")]
    AlreadyExists(String),
    #[error("workflow '{0}' is not registered")]
    NotFound(String),
}
