//! # service-registry
//!
//! Hierarchical, lazily-evaluated service registry with plugin discovery.
//!
//! ## Features
//!
//! - **Lazy, cached creation**: every factory runs at most once per registry
//!   node, even under concurrent first use
//! - **Parent/child scopes**: lookups fall back to the parent; children can
//!   decorate what the parent provides
//! - **Composition**: sibling registries merged into a node as extra lookup
//!   sources, with ambiguity detection
//! - **Cycle detection**: re-entrant resolution fails with the full dependency
//!   path, on one thread or across threads
//! - **Plugin discovery**: a service locator reading provider configurations
//!   and instantiating implementations through constructor injection
//!
//! ## Quick Start
//!
//! ```rust
//! use service_registry::{ServiceRegistry, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let registry = ServiceRegistry::named("global");
//! registry
//!     .add_instance(Database {
//!         connection_string: "postgres://localhost".to_string(),
//!     })
//!     .unwrap();
//! registry
//!     .add_factory::<UserService, _>(|resolver| {
//!         Ok(UserService {
//!             db: resolver.get::<Database>()?,
//!         })
//!     })
//!     .unwrap();
//!
//! let user_service = registry.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Scopes and Decoration
//!
//! ```rust
//! use service_registry::{ServiceRegistry, Resolver};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn prefix(&self) -> String;
//! }
//!
//! struct RootLogger;
//! impl Logger for RootLogger {
//!     fn prefix(&self) -> String { "[root]".to_string() }
//! }
//!
//! struct ScopedLogger(Arc<dyn Logger>);
//! impl Logger for ScopedLogger {
//!     fn prefix(&self) -> String { format!("{}[project]", self.0.prefix()) }
//! }
//!
//! let root = ServiceRegistry::named("build");
//! root.add_instance_trait(Arc::new(RootLogger) as Arc<dyn Logger>).unwrap();
//!
//! let project = root.create_child("project");
//! project
//!     .add_decorator_trait::<dyn Logger, _>(|_, inner| Ok(Arc::new(ScopedLogger(inner)) as Arc<dyn Logger>))
//!     .unwrap();
//!
//! assert_eq!(project.get_required_trait::<dyn Logger>().prefix(), "[root][project]");
//! assert_eq!(root.get_required_trait::<dyn Logger>().prefix(), "[root]");
//! ```
//!
//! ## Closing
//!
//! `close()` releases, in reverse creation order, every instance a node
//! created and whose binding carries a release operation, then rejects
//! further use with [`DiError::RegistryClosed`].

pub mod binding;
pub mod config;
pub mod error;
pub mod key;
pub mod locator;
pub mod observer;
pub mod plugin;
pub mod registry;
pub mod traits;

mod internal;

pub use binding::{AnyArc, Binding, Cardinality};
pub use config::{LocatorConfig, RegistryConfig};
pub use error::{BoxError, DiError, DiResult, DisposalFailure};
pub use key::{key_of_type, Key};
pub use locator::{
    DirectorySearchContext, Implementation, ImplementationTable, Located, Resource, SearchContext,
    ServiceContract, ServiceLocator, StaticSearchContext,
};
pub use observer::{RegistryObserver, TracingObserver};
pub use plugin::{compose_extensions, PluginContribution, PluginExtensions, PluginServiceRegistry};
pub use registry::{ResolverContext, ServiceModule, ServiceRegistry, ServiceRegistryModuleExt};
pub use traits::{Dispose, Resolver, ResolverCore};
