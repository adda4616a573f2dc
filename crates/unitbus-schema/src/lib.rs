//! Declarative schema language and validator.
//!
//! A [`Schema`] is a recursive, reflectively inspectable description of a
//! value, used both to validate unit inputs/outputs and to drive tool-surface
//! reflection (the data an MCP/OpenAPI adapter would serialize).

mod descriptor;
mod kind;
mod pattern_cache;
mod validate;
mod violation;

pub use descriptor::{DescriptorExample, ToolDescriptor};
pub use kind::SchemaType;
pub use validate::validate;
pub use violation::{PathSegment, Violation, ViolationCode};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// A named `(name, schema)` pair, used for the `Field` examples referenced by
/// reflection output (object properties are represented inline via `Schema::properties`
/// instead; `Field` exists for call sites that need to carry a schema
/// alongside its property name, e.g. reflection output).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// A recursive, reflectively inspectable description of a value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    #[serde(rename = "type")]
    pub ty: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub properties: BTreeMap<String, Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub optional: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Open-world by default; set via
    /// [`Schema::closed`] to reject undeclared object properties.
    #[serde(default = "default_true")]
    pub additional_properties: bool,
}

fn default_true() -> bool {
    true
}

/// A schema that violates one of the structural invariants below.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaDefError {
    #[error("required field '{0}' is not declared in properties")]
    RequiredNotDeclared(String),
    #[error("array schema is missing `items`")]
    MissingItems,
    #[error("enum value at index {0} does not match the declared scalar type")]
    EnumTypeMismatch(usize),
    #[error("min ({min}) is greater than max ({max})")]
    BoundsInverted { min: f64, max: f64 },
    #[error("minLength ({min}) is greater than maxLength ({max})")]
    LengthBoundsInverted { min: usize, max: usize },
    #[error("pattern is not a valid regular expression: {0}")]
    InvalidPattern(String),
}

impl Schema {
    fn base(ty: SchemaType) -> Self {
        Self {
            ty,
            title: None,
            description: None,
            format: None,
            enum_values: None,
            default: None,
            properties: BTreeMap::new(),
            items: None,
            required: Vec::new(),
            optional: Vec::new(),
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            additional_properties: true,
        }
    }

    pub fn string() -> Self {
        Self::base(SchemaType::String)
    }

    pub fn number() -> Self {
        Self::base(SchemaType::Number)
    }

    pub fn integer() -> Self {
        Self::base(SchemaType::Integer)
    }

    pub fn boolean() -> Self {
        Self::base(SchemaType::Boolean)
    }

    pub fn null() -> Self {
        Self::base(SchemaType::Null)
    }

    pub fn object(properties: BTreeMap<String, Schema>, required: Vec<String>) -> Self {
        let mut s = Self::base(SchemaType::Object);
        s.properties = properties;
        s.required = required;
        s
    }

    pub fn array(items: Schema) -> Self {
        let mut s = Self::base(SchemaType::Array);
        s.items = Some(Box::new(items));
        s
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn enum_values(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn required(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn optional(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.optional = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Reject object properties not present in `properties`; the default is open-world.
    pub fn closed(mut self) -> Self {
        self.additional_properties = false;
        self
    }

    /// Check the structural invariants below. Called by the Registry
    /// when a unit's `input_schema`/`output_schema` is registered, so
    /// malformed schemas are rejected at registration time rather than at
    /// every dispatch.
    pub fn check_invariants(&self) -> Result<(), SchemaDefError> {
        match self.ty {
            SchemaType::Object => {
                for name in &self.required {
                    if !self.properties.contains_key(name) {
                        return Err(SchemaDefError::RequiredNotDeclared(name.clone()));
                    }
                }
                for prop in self.properties.values() {
                    prop.check_invariants()?;
                }
            }
            SchemaType::Array => {
                let items = self.items.as_ref().ok_or(SchemaDefError::MissingItems)?;
                items.check_invariants()?;
            }
            _ => {}
        }

        if let Some(values) = &self.enum_values {
            for (i, v) in values.iter().enumerate() {
                let matches = match self.ty {
                    SchemaType::String => v.is_string(),
                    SchemaType::Number => v.is_number(),
                    SchemaType::Integer => v.is_i64() || v.is_u64(),
                    SchemaType::Boolean => v.is_boolean(),
                    SchemaType::Null => v.is_null(),
                    SchemaType::Object | SchemaType::Array => true,
                };
                if !matches {
                    return Err(SchemaDefError::EnumTypeMismatch(i));
                }
            }
        }

        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(SchemaDefError::BoundsInverted { min, max });
            }
        }

        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(SchemaDefError::LengthBoundsInverted { min, max });
            }
        }

        if let Some(pattern) = &self.pattern {
            pattern_cache::compile(pattern)
                .map_err(|e| SchemaDefError::InvalidPattern(e.to_string()))?;
        }

        Ok(())
    }
}
