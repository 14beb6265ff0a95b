//! Disposal trait for resource cleanup.

use crate::error::BoxError;

/// Release operation for services holding resources.
///
/// Implement this for services that need structured teardown (flushing
/// caches, closing connections). A registry runs the release operations of
/// the instances it created in reverse creation order when it is closed. A
/// failing release is collected and reported; it never stops the others.
///
/// # Examples
///
/// ```
/// use service_registry::{Dispose, ServiceRegistry, Resolver, BoxError};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), BoxError> {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let registry = ServiceRegistry::new();
/// registry
///     .add_disposable_factory::<Cache, _>(|_| Ok(Cache { name: "user_cache".to_string() }))
///     .unwrap();
///
/// let _cache = registry.get_required::<Cache>();
/// registry.close().unwrap();
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Release the resources held by this service.
    fn dispose(&self) -> Result<(), BoxError>;
}
