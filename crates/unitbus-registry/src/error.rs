/// Failure modes for registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unit '{0}' is already registered")]
    AlreadyExists(String),
    #[error("unit '{0}' is not registered")]
    NotFound(String),
}
