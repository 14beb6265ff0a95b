//! Resolver context handed to factories.

use crate::binding::AnyArc;
use crate::error::{BoxError, DiResult};
use crate::key::Key;
use crate::traits::ResolverCore;

use super::ServiceRegistry;

/// Context passed to factory functions for resolving their dependencies.
///
/// The context resolves against the registry that declared the binding being
/// created: its own bindings, its composed registries, then its parents.
/// Release hooks registered through the context belong to that registry.
///
/// # Examples
///
/// ```
/// use service_registry::{ServiceRegistry, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let registry = ServiceRegistry::new();
/// registry.add_instance(Database { url: "postgres://localhost".to_string() }).unwrap();
/// registry
///     .add_factory::<UserService, _>(|resolver| {
///         Ok(UserService { db: resolver.get::<Database>()? })
///     })
///     .unwrap();
///
/// assert_eq!(registry.get_required::<UserService>().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    registry: &'a ServiceRegistry,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(registry: &'a ServiceRegistry) -> Self {
        Self { registry }
    }

    /// The registry that declared the binding being created.
    pub fn registry(&self) -> &'a ServiceRegistry {
        self.registry
    }
}

impl ResolverCore for ResolverContext<'_> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.registry.get_any(key)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.registry.get_all_any(key)
    }

    fn contains_key(&self, key: &Key) -> bool {
        self.registry.contains(key)
    }

    fn push_disposer(&self, service: String, hook: Box<dyn FnOnce() -> Result<(), BoxError> + Send>) {
        self.registry.push_disposer(service, hook);
    }
}
