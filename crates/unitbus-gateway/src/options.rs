use crate::WorkflowDispatcher;
use std::sync::Arc;
use std::time::Duration;
use unitbus_core::EventPublisher;
use unitbus_registry::Registry;

/// Construction-time configuration for a [`crate::Gateway`]. Unknown fields
/// are rejected at the type level: every knob here has an explicit setter,
/// there is no passthrough bag.
#[derive(Clone)]
pub struct GatewayOptions {
    pub default_timeout: Duration,
    pub workflow_dispatcher: Option<Arc<dyn WorkflowDispatcher>>,
    pub event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            workflow_dispatcher: None,
            event_publisher: None,
        }
    }
}

/// Builds a [`crate::Gateway`] over a [`Registry`].
pub struct GatewayBuilder {
    registry: Registry,
    options: GatewayOptions,
}

impl GatewayBuilder {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            options: GatewayOptions::default(),
        }
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.options.default_timeout = timeout;
        self
    }

    pub fn workflow_dispatcher(mut self, dispatcher: Arc<dyn WorkflowDispatcher>) -> Self {
        self.options.workflow_dispatcher = Some(dispatcher);
        self
    }

    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.options.event_publisher = Some(publisher);
        self
    }

    pub fn build(self) -> crate::Gateway {
        crate::Gateway::new(self.registry, self.options)
    }
}
