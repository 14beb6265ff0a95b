//! Plugin extension composition.
//!
//! Plugins contribute services by implementing [`PluginServiceRegistry`] and
//! declaring the implementation in the provider configuration for
//! `service_registry.PluginServiceRegistry`. [`compose_extensions`] discovers
//! every plugin, asks each for a child registry scoped to its contributions,
//! and composes those children into the root in discovery order.
//!
//! ```
//! use service_registry::{
//!     compose_extensions, DiResult, Implementation, PluginServiceRegistry, Resolver,
//!     ServiceLocator, ServiceRegistry, StaticSearchContext,
//! };
//! use std::sync::Arc;
//!
//! struct Greeting(String);
//!
//! struct GreetingPlugin;
//!
//! impl PluginServiceRegistry for GreetingPlugin {
//!     fn create_services(&self, root: &ServiceRegistry) -> DiResult<ServiceRegistry> {
//!         let services = root.create_child("greeting-plugin");
//!         services.add_instance(Greeting("hello".to_string()))?;
//!         Ok(services)
//!     }
//! }
//!
//! let context = StaticSearchContext::new("plugins")
//!     .with_resource(
//!         "META-INF/services/service_registry.PluginServiceRegistry",
//!         "org.example.GreetingPlugin\n",
//!     )
//!     .with_implementation(
//!         Implementation::new("org.example.GreetingPlugin")
//!             .constructor::<dyn PluginServiceRegistry, _>(&[], |_| {
//!                 Ok(Arc::new(GreetingPlugin) as Arc<dyn PluginServiceRegistry>)
//!             }),
//!     );
//!
//! let root = ServiceRegistry::named("root");
//! let extensions = compose_extensions(&root, &ServiceLocator::new(), &context).unwrap();
//! assert_eq!(extensions.len(), 1);
//! assert_eq!(root.get_required::<Greeting>().0, "hello");
//! ```

use crate::error::{DiError, DiResult, DisposalFailure};
use crate::locator::{SearchContext, ServiceContract, ServiceLocator};
use crate::registry::ServiceRegistry;

/// Extension point implemented by plugins.
///
/// `create_services` receives the root registry and returns a registry
/// holding the plugin's contributions. The usual shape is a child of the
/// root, so the plugin's factories can depend on root services.
pub trait PluginServiceRegistry: Send + Sync {
    fn create_services(&self, root: &ServiceRegistry) -> DiResult<ServiceRegistry>;
}

impl ServiceContract for dyn PluginServiceRegistry {
    const NAME: &'static str = "service_registry.PluginServiceRegistry";
}

/// A plugin's contribution: its implementation name and the registry it produced.
#[derive(Debug, Clone)]
pub struct PluginContribution {
    pub plugin: String,
    pub registry: ServiceRegistry,
}

/// The contributions composed into a root registry, in discovery order.
#[derive(Debug, Default)]
pub struct PluginExtensions {
    contributions: Vec<PluginContribution>,
}

impl PluginExtensions {
    pub fn contributions(&self) -> &[PluginContribution] {
        &self.contributions
    }

    /// Implementation names of the composed plugins.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.contributions.iter().map(|c| c.plugin.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    /// Closes every contributed registry, newest first.
    ///
    /// Every registry is closed even when an earlier one fails; failures are
    /// reported together.
    pub fn close(&self) -> DiResult<()> {
        let mut failures: Vec<DisposalFailure> = Vec::new();
        for contribution in self.contributions.iter().rev() {
            match contribution.registry.close() {
                Ok(()) => {}
                Err(DiError::Disposal { failures: inner, .. }) => failures.extend(inner),
                Err(other) => failures.push(DisposalFailure {
                    service: contribution.plugin.clone(),
                    message: other.to_string(),
                }),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal {
                registry: "plugin extensions".to_string(),
                failures,
            })
        }
    }
}

/// Discovers every plugin in `context` and composes its services into `root`.
///
/// All plugins are asked for their registries before anything is composed:
/// when one fails, the error is returned as
/// [`PluginContribution`](DiError::PluginContribution), the registries
/// already produced are closed, and `root` is left untouched. Discovery
/// errors from the locator are returned unchanged.
pub fn compose_extensions(
    root: &ServiceRegistry,
    locator: &ServiceLocator,
    context: &dyn SearchContext,
) -> DiResult<PluginExtensions> {
    let plugins = locator.find_all::<dyn PluginServiceRegistry>(context, root)?;
    tracing::debug!(registry = %root.name(), context = context.name(), plugins = plugins.len(), "composing plugin extensions");

    let mut extensions = PluginExtensions::default();
    for plugin in plugins {
        match plugin.instance.create_services(root) {
            Ok(registry) => extensions.contributions.push(PluginContribution {
                plugin: plugin.implementation,
                registry,
            }),
            Err(cause) => {
                tracing::error!(plugin = %plugin.implementation, error = %cause, "plugin failed to contribute services");
                if let Err(err) = extensions.close() {
                    tracing::warn!(error = %err, "failed to release partial plugin contributions");
                }
                return Err(DiError::PluginContribution {
                    plugin: plugin.implementation,
                    cause: Box::new(cause),
                });
            }
        }
    }

    for contribution in &extensions.contributions {
        root.compose(contribution.registry.clone())?;
        tracing::info!(registry = %root.name(), plugin = %contribution.plugin, contributed = %contribution.registry.name(), "composed plugin services");
    }
    Ok(extensions)
}
