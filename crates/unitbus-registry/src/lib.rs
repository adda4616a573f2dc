//! Process-wide catalog of units and resource factories.

mod cache;
mod error;
mod registry;

pub use cache::ReadThroughCache;
pub use error::RegistryError;
pub use registry::{Registry, ResourceOrFactory, UnitHandle};
