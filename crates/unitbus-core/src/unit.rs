use crate::{ExecutionContext, StreamChunk, UnitError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use unitbus_schema::{DescriptorExample, Schema, ToolDescriptor};

/// An input/output example pair carried by a unit for documentation and
/// reflective tool listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Example {
    pub input: Value,
    pub output: Value,
}

/// Metadata shared by Commands and Queries.
pub trait UnitMeta: Send + Sync {
    fn name(&self) -> &str;
    fn domain(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &Schema;
    fn output_schema(&self) -> &Schema;
    fn examples(&self) -> &[Example] {
        &[]
    }

    /// The reflective descriptor an MCP or OpenAPI adapter would serialize,
    /// derived from this unit's own metadata.
    fn descriptor(&self) -> ToolDescriptor {
        let examples = self
            .examples()
            .iter()
            .map(|e| DescriptorExample {
                input: e.input.clone(),
                output: e.output.clone(),
            })
            .collect();
        ToolDescriptor::new(
            self.name(),
            self.description(),
            self.input_schema().clone(),
            self.output_schema().clone(),
        )
        .with_examples(examples)
    }
}

/// A side-effecting unit.
#[async_trait]
pub trait Command: UnitMeta {
    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value, UnitError>;
}

/// A read-only unit.
#[async_trait]
pub trait Query: UnitMeta {
    async fn execute(&self, ctx: &ExecutionContext, input: Value) -> Result<Value, UnitError>;
}

/// Optional streaming capability for a Command, auxiliary to [`Command`]
///. A unit that wants to stream implements both
/// traits; the gateway checks for this trait via `downcast`/explicit wiring
/// rather than inheritance, since not every Command streams.
#[async_trait]
pub trait StreamingCommand: UnitMeta {
    async fn execute_stream(
        &self,
        ctx: &ExecutionContext,
        input: Value,
    ) -> BoxStream<'static, StreamChunk>;
}

/// Optional streaming capability for a Query.
#[async_trait]
pub trait StreamingQuery: UnitMeta {
    async fn execute_stream(
        &self,
        ctx: &ExecutionContext,
        input: Value,
    ) -> BoxStream<'static, StreamChunk>;
}

/// Metadata for a URI-addressable [`Resource`].
pub trait ResourceMeta: Send + Sync {
    fn uri(&self) -> &str;
    fn domain(&self) -> &str;
    fn schema(&self) -> &Schema;
}

/// A URI-addressable, fetchable entity.
#[async_trait]
pub trait Resource: ResourceMeta {
    async fn get(&self, ctx: &ExecutionContext) -> Result<Value, UnitError>;

    /// Stream updates to this resource. Resources that never change may
    /// return an empty stream.
    async fn watch(&self, ctx: &ExecutionContext) -> BoxStream<'static, StreamChunk>;
}

/// Instantiates [`Resource`]s from a URI that matches `pattern`.
#[async_trait]
pub trait ResourceFactory: Send + Sync {
    fn pattern(&self) -> &str;
    fn can_create(&self, uri: &str) -> bool;
    async fn create(&self, uri: &str) -> Result<Box<dyn Resource>, UnitError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutionContext;
    use std::collections::BTreeMap;

    struct EchoQuery {
        input_schema: Schema,
        output_schema: Schema,
    }

    impl EchoQuery {
        fn new() -> Self {
            let schema = Schema::object(BTreeMap::new(), vec!["value".to_string()])
                .property("value", Schema::string());
            Self {
                input_schema: schema.clone(),
                output_schema: schema,
            }
        }
    }

    impl UnitMeta for EchoQuery {
        fn name(&self) -> &str {
            "echo.noop"
        }
        fn domain(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "returns its input unchanged"
        }
        fn input_schema(&self) -> &Schema {
            &self.input_schema
        }
        fn output_schema(&self) -> &Schema {
            &self.output_schema
        }
    }

    #[async_trait]
    impl Query for EchoQuery {
        async fn execute(&self, _ctx: &ExecutionContext, input: Value) -> Result<Value, UnitError> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn command_trait_is_object_safe_and_dispatchable() {
        let unit: Box<dyn Query> = Box::new(EchoQuery::new());
        let ctx = ExecutionContext::new(unit.domain(), unit.name());
        let out = unit
            .execute(&ctx, serde_json::json!({"value": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"value": "hi"}));
    }
}
