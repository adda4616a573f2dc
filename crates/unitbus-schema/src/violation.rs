use serde::{Deserialize, Serialize};
use std::fmt;

/// One step on the path from the validation root to the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{k}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// The stable machine-readable violation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    TypeMismatch,
    MissingRequired,
    UnknownPropertyRejected,
    EnumViolation,
    OutOfRange,
    PatternMismatch,
    LengthViolation,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::TypeMismatch => "type_mismatch",
            ViolationCode::MissingRequired => "missing_required",
            ViolationCode::UnknownPropertyRejected => "unknown_property_rejected",
            ViolationCode::EnumViolation => "enum_violation",
            ViolationCode::OutOfRange => "out_of_range",
            ViolationCode::PatternMismatch => "pattern_mismatch",
            ViolationCode::LengthViolation => "length_violation",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structural validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: Vec<PathSegment>,
    pub code: ViolationCode,
    pub message: String,
}

impl Violation {
    pub fn new(path: Vec<PathSegment>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            path,
            code,
            message: message.into(),
        }
    }

    /// Render the path the way error.details consumers expect, e.g. `value`
    /// or `user.tags[2]`.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.path.iter().enumerate() {
            match seg {
                PathSegment::Key(k) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(k);
                }
                PathSegment::Index(_) => out.push_str(&seg.to_string()),
            }
        }
        out
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.path_string(), self.message, self.code)
    }
}
