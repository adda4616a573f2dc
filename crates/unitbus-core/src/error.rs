use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The surfaced error taxonomy.
///
/// Domain-specific codes (`engine_not_running`, `model_not_found`, ...) are
/// opaque pass-through strings carried in [`UnitError::code`] directly; the
/// platform never classifies their severity, so they are not variants here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    ValidationFailed,
    InvalidRequest,
    UnitNotFound,
    ResourceNotFound,
    InternalError,
    PanicRecovered,
    TimeoutExceeded,
    Cancelled,
    StepNotFound,
    InvalidDependency,
    CyclicDependencies,
    DanglingReference,
    AlreadyExists,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::ValidationFailed => "validation_failed",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::UnitNotFound => "unit_not_found",
            ErrorCode::ResourceNotFound => "resource_not_found",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::PanicRecovered => "panic_recovered",
            ErrorCode::TimeoutExceeded => "timeout_exceeded",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::StepNotFound => "step_not_found",
            ErrorCode::InvalidDependency => "invalid_dependency",
            ErrorCode::CyclicDependencies => "cyclic_dependencies",
            ErrorCode::DanglingReference => "dangling_reference",
            ErrorCode::AlreadyExists => "already_exists",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit-returned or platform-recovered error, surfaced in `error` of the
/// response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct UnitError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl UnitError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            domain: None,
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.as_str(), message)
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
