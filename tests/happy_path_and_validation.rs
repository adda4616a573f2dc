mod common;

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use unitbus::prelude::*;

struct Echo {
    schema: Schema,
}

impl Echo {
    fn new() -> Self {
        Self {
            schema: Schema::object(BTreeMap::new(), vec!["value".to_string()])
                .property("value", Schema::string()),
        }
    }
}

impl UnitMeta for Echo {
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
        &self.schema
    }
    fn output_schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl Query for Echo {
    async fn execute(&self, _ctx: &ExecutionContext, input: serde_json::Value) -> Result<serde_json::Value, UnitError> {
        Ok(input)
    }
}

#[tokio::test]
async fn happy_path_query_returns_its_input() {
    common::init_tracing();
    let platform = Platform::new();
    platform.registry.register_query(Arc::new(Echo::new())).await.unwrap();

    let response = platform
        .gateway
        .dispatch(Request::new(RequestKind::Query, "echo.noop", json!({"value": "hi"})))
        .await;

    assert!(response.is_ok());
    assert_eq!(response.output, Some(json!({"value": "hi"})));
    assert!(response.meta.duration_ms < 10_000);
}

#[tokio::test]
async fn invalid_input_is_a_validation_failure_naming_the_offending_path() {
    common::init_tracing();
    let platform = Platform::new();
    platform.registry.register_query(Arc::new(Echo::new())).await.unwrap();

    let response = platform
        .gateway
        .dispatch(Request::new(RequestKind::Query, "echo.noop", json!({"value": 42})))
        .await;

    assert!(!response.is_ok());
    let error = response.error.unwrap();
    assert_eq!(error.code, "validation_failed");
    let details = error.details.unwrap();
    let violations: Vec<Violation> = serde_json::from_value(details).unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].code, ViolationCode::TypeMismatch);
}
