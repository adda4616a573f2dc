use crate::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An input/output example pair attached to a [`ToolDescriptor`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DescriptorExample {
    pub input: Value,
    pub output: Value,
}

/// The reflective shape of a unit, independent of any particular adapter.
/// An MCP or OpenAPI surface serializes this directly; unitbus ships the
/// data, not a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub examples: Vec<DescriptorExample>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Schema,
        output_schema: Schema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
            examples: Vec::new(),
        }
    }

    pub fn with_examples(mut self, examples: Vec<DescriptorExample>) -> Self {
        self.examples = examples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn descriptor_serializes_with_named_schemas() {
        let descriptor = ToolDescriptor::new(
            "echo.noop",
            "returns its input unchanged",
            Schema::object(BTreeMap::new(), vec![]),
            Schema::object(BTreeMap::new(), vec![]),
        );
        let v = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(v["name"], "echo.noop");
        assert!(v.get("examples").is_none());
    }
}
