use crate::RegistryError;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use unitbus_core::{Command, Query, Resource, ResourceFactory, StreamingCommand, StreamingQuery, UnitMeta};
use unitbus_schema::ToolDescriptor;

#[derive(Default)]
struct RegistryInner {
    commands: IndexMap<String, Arc<dyn Command>>,
    queries: IndexMap<String, Arc<dyn Query>>,
    resources: IndexMap<String, Arc<dyn Resource>>,
    resource_factories: Vec<(String, Arc<dyn ResourceFactory>)>,
    streaming_commands: IndexMap<String, Arc<dyn StreamingCommand>>,
    streaming_queries: IndexMap<String, Arc<dyn StreamingQuery>>,
}

/// A process-wide catalog of units and resource factories.
///
/// Many readers, rare writers: backed by a `tokio::sync::RwLock` so lookups
/// never block on a concurrent registration elsewhere in the process.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(self, cmd), fields(unit = %cmd.name()))]
    pub async fn register_command(&self, cmd: Arc<dyn Command>) -> Result<(), RegistryError> {
        let name = cmd.name().to_string();
        let mut inner = self.inner.write().await;
        if inner.commands.contains_key(&name) {
            tracing::warn!("command already registered");
            return Err(RegistryError::AlreadyExists(name));
        }
        inner.commands.insert(name, cmd);
        tracing::info!("command registered");
        Ok(())
    }

    #[tracing::instrument(skip(self, query), fields(unit = %query.name()))]
    pub async fn register_query(&self, query: Arc<dyn Query>) -> Result<(), RegistryError> {
        let name = query.name().to_string();
        let mut inner = self.inner.write().await;
        if inner.queries.contains_key(&name) {
            tracing::warn!("query already registered");
            return Err(RegistryError::AlreadyExists(name));
        }
        inner.queries.insert(name, query);
        tracing::info!("query registered");
        Ok(())
    }

    #[tracing::instrument(skip(self, resource), fields(uri = %resource.uri()))]
    pub async fn register_resource(&self, resource: Arc<dyn Resource>) -> Result<(), RegistryError> {
        let uri = resource.uri().to_string();
        let mut inner = self.inner.write().await;
        if inner.resources.contains_key(&uri) {
            tracing::warn!("resource already registered");
            return Err(RegistryError::AlreadyExists(uri));
        }
        inner.resources.insert(uri, resource);
        tracing::info!("resource registered");
        Ok(())
    }

    pub async fn register_resource_factory(
        &self,
        factory: Arc<dyn ResourceFactory>,
    ) -> Result<(), RegistryError> {
        let pattern = factory.pattern().to_string();
        let mut inner = self.inner.write().await;
        if inner.resource_factories.iter().any(|(p, _)| p == &pattern) {
            return Err(RegistryError::AlreadyExists(pattern));
        }
        inner.resource_factories.push((pattern, factory));
        Ok(())
    }

    /// Register an additional streaming capability for a command under the
    /// same name. Does not require `register_command` to have run first or
    /// since; the two maps are independent.
    pub async fn register_streaming_command(
        &self,
        name: impl Into<String>,
        unit: Arc<dyn StreamingCommand>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut inner = self.inner.write().await;
        if inner.streaming_commands.contains_key(&name) {
            return Err(RegistryError::AlreadyExists(name));
        }
        inner.streaming_commands.insert(name, unit);
        Ok(())
    }

    pub async fn register_streaming_query(
        &self,
        name: impl Into<String>,
        unit: Arc<dyn StreamingQuery>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut inner = self.inner.write().await;
        if inner.streaming_queries.contains_key(&name) {
            return Err(RegistryError::AlreadyExists(name));
        }
        inner.streaming_queries.insert(name, unit);
        Ok(())
    }

    pub async fn get_streaming_command(&self, name: &str) -> Option<Arc<dyn StreamingCommand>> {
        self.inner.read().await.streaming_commands.get(name).cloned()
    }

    pub async fn get_streaming_query(&self, name: &str) -> Option<Arc<dyn StreamingQuery>> {
        self.inner.read().await.streaming_queries.get(name).cloned()
    }

    pub async fn get_command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.inner.read().await.commands.get(name).cloned()
    }

    pub async fn get_query(&self, name: &str) -> Option<Arc<dyn Query>> {
        self.inner.read().await.queries.get(name).cloned()
    }

    /// Look up `name` as either a command or a query, whichever is bound.
    pub async fn get(&self, name: &str) -> Option<UnitHandle> {
        let inner = self.inner.read().await;
        if let Some(cmd) = inner.commands.get(name) {
            return Some(UnitHandle::Command(cmd.clone()));
        }
        inner
            .queries
            .get(name)
            .map(|q| UnitHandle::Query(q.clone()))
    }

    /// A statically registered resource at `uri`, ignoring factories.
    pub async fn get_resource(&self, uri: &str) -> Option<Arc<dyn Resource>> {
        self.inner.read().await.resources.get(uri).cloned()
    }

    /// A resource at `uri`, falling back to the first matching factory
    /// (in registration order) if no static resource is bound.
    pub async fn get_resource_with_factory(&self, uri: &str) -> Option<ResourceOrFactory> {
        let inner = self.inner.read().await;
        if let Some(resource) = inner.resources.get(uri) {
            return Some(ResourceOrFactory::Resource(resource.clone()));
        }
        inner
            .resource_factories
            .iter()
            .find(|(_, factory)| factory.can_create(uri))
            .map(|(_, factory)| ResourceOrFactory::Factory(factory.clone()))
    }

    pub async fn list_commands(&self) -> Vec<Arc<dyn Command>> {
        self.inner.read().await.commands.values().cloned().collect()
    }

    pub async fn list_queries(&self) -> Vec<Arc<dyn Query>> {
        self.inner.read().await.queries.values().cloned().collect()
    }

    pub async fn list_resources(&self) -> Vec<Arc<dyn Resource>> {
        self.inner.read().await.resources.values().cloned().collect()
    }

    /// The reflective descriptor of every registered command and query, in
    /// registration order, for an MCP/OpenAPI adapter to serialize.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().await;
        inner
            .commands
            .values()
            .map(|c| c.descriptor())
            .chain(inner.queries.values().map(|q| q.descriptor()))
            .collect()
    }

    pub async fn command_count(&self) -> usize {
        self.inner.read().await.commands.len()
    }

    pub async fn query_count(&self) -> usize {
        self.inner.read().await.queries.len()
    }

    pub async fn resource_count(&self) -> usize {
        self.inner.read().await.resources.len()
    }
}

/// Either side of a `get` lookup, since a name resolves to exactly one.
#[derive(Clone)]
pub enum UnitHandle {
    Command(Arc<dyn Command>),
    Query(Arc<dyn Query>),
}

impl UnitHandle {
    pub fn name(&self) -> &str {
        match self {
            UnitHandle::Command(c) => c.name(),
            UnitHandle::Query(q) => q.name(),
        }
    }
}

#[derive(Clone)]
pub enum ResourceOrFactory {
    Resource(Arc<dyn Resource>),
    Factory(Arc<dyn ResourceFactory>),
}
