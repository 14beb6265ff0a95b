//! Service modules for grouped registration.

use crate::error::DiResult;

use super::ServiceRegistry;

/// A group of bindings registered together.
///
/// Each subsystem contributes its services as a module with explicit,
/// compile-time checked registrations.
///
/// # Example
///
/// ```rust
/// use service_registry::{ServiceRegistry, ServiceModule, ServiceRegistryModuleExt, DiResult, Resolver};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct CacheConfig;
///
/// struct CacheFactory {
///     config: Arc<CacheConfig>,
/// }
///
/// struct CacheModule;
///
/// impl ServiceModule for CacheModule {
///     fn register_services(self, registry: &ServiceRegistry) -> DiResult<()> {
///         registry.add_instance(CacheConfig::default())?;
///         registry.add_factory::<CacheFactory, _>(|r| {
///             Ok(CacheFactory { config: r.get::<CacheConfig>()? })
///         })?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let registry = ServiceRegistry::named("global");
/// registry.add_module(CacheModule)?;
/// let _factory = registry.get::<CacheFactory>()?;
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Register this module's bindings with the registry.
    fn register_services(self, registry: &ServiceRegistry) -> DiResult<()>;
}

/// Extension trait providing module registration on a registry.
pub trait ServiceRegistryModuleExt {
    /// Registers every binding of `module`, returning the registry for chaining.
    fn add_module<M: ServiceModule>(&self, module: M) -> DiResult<&Self>;
}

impl ServiceRegistryModuleExt for ServiceRegistry {
    fn add_module<M: ServiceModule>(&self, module: M) -> DiResult<&Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
