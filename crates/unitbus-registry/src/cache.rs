use crate::Registry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use unitbus_core::Command;

/// A hot read-through cache in front of a [`Registry`]'s command lookups.
///
/// Populated lazily on first miss and updated in the same critical section
/// as the underlying registration, so a cached entry is never stale for a
/// name this cache has already resolved. There is no de-registration API on
/// [`Registry`], so this cache never needs to invalidate an entry — only
/// ever add one.
#[derive(Clone)]
pub struct ReadThroughCache {
    registry: Registry,
    hot: Arc<RwLock<HashMap<String, Arc<dyn Command>>>>,
}

impl ReadThroughCache {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            hot: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get_command(&self, name: &str) -> Option<Arc<dyn Command>> {
        if let Some(cmd) = self.hot.read().get(name) {
            return Some(cmd.clone());
        }
        let cmd = self.registry.get_command(name).await?;
        self.hot.write().insert(name.to_string(), cmd.clone());
        Some(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use unitbus_core::{ExecutionContext, UnitError, UnitMeta};
    use unitbus_schema::Schema;

    struct Noop(Schema);

    impl UnitMeta for Noop {
        fn name(&self) -> &str {
            "echo.noop"
        }
        fn domain(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "no-op"
        }
        fn input_schema(&self) -> &Schema {
            &self.0
        }
        fn output_schema(&self) -> &Schema {
            &self.0
        }
    }

    #[async_trait]
    impl Command for Noop {
        async fn execute(&self, _ctx: &ExecutionContext, input: Value) -> Result<Value, UnitError> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_the_hot_map() {
        let registry = Registry::new();
        registry
            .register_command(Arc::new(Noop(Schema::null())))
            .await
            .unwrap();
        let cache = ReadThroughCache::new(registry);
        assert!(cache.get_command("echo.noop").await.is_some());
        assert!(cache.get_command("echo.noop").await.is_some());
        assert!(cache.get_command("missing").await.is_none());
    }
}
