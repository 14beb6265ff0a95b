//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::binding::AnyArc;
use crate::error::{BoxError, DiError, DiResult};
use crate::key::Key;
use crate::traits::Dispose;

/// Core resolver trait for object-safe service resolution.
///
/// Implemented by [`ServiceRegistry`](crate::ServiceRegistry) and by the
/// [`ResolverContext`](crate::ResolverContext) handed to factories. Most
/// callers use the typed methods of [`Resolver`] instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single service through own bindings, composed registries
    /// and the parent chain.
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc>;

    /// Resolves every binding for `key`, singular and collection, from own
    /// bindings, composed registries and the parent chain, in that order.
    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>>;

    /// Whether `resolve_any` would find a binding for `key`, without creating anything.
    fn contains_key(&self, key: &Key) -> bool;

    /// Registers a release hook run when the owning registry closes.
    fn push_disposer(&self, service: String, hook: Box<dyn FnOnce() -> Result<(), BoxError> + Send>);
}

/// High-level resolver interface with generic methods for type-safe resolution.
///
/// # Examples
///
/// ```
/// use service_registry::{ServiceRegistry, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str);
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) {
///         println!("LOG: {}", msg);
///     }
/// }
///
/// let registry = ServiceRegistry::new();
/// registry.add_instance(42usize).unwrap();
/// registry.add_instance_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>).unwrap();
///
/// assert_eq!(*registry.get_required::<usize>(), 42);
/// registry.get_required_trait::<dyn Logger>().log("resolved");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    fn get<T: 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&Key::of::<T>())?;
        downcast::<T>(any)
    }

    /// Resolves a concrete service type qualified by `name`.
    fn get_named<T: 'static + Send + Sync>(&self, name: &'static str) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&Key::named::<T>(name))?;
        downcast::<T>(any)
    }

    /// Resolves a trait contract (`dyn Trait`).
    fn get_trait<T: ?Sized + 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&Key::of_trait::<T>())?;
        downcast_trait::<T>(any)
    }

    /// Resolves a trait contract qualified by `name`.
    fn get_named_trait<T: ?Sized + 'static + Send + Sync>(&self, name: &'static str) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&Key::named_trait::<T>(name))?;
        downcast_trait::<T>(any)
    }

    /// Resolves every value bound to the concrete type `T`.
    fn get_all<T: 'static + Send + Sync>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&Key::of::<T>())?
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }

    /// Resolves every implementation bound to the trait contract `T`.
    ///
    /// ```
    /// use service_registry::{ServiceRegistry, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Plugin: Send + Sync {
    ///     fn name(&self) -> &str;
    /// }
    ///
    /// struct A;
    /// impl Plugin for A { fn name(&self) -> &str { "a" } }
    /// struct B;
    /// impl Plugin for B { fn name(&self) -> &str { "b" } }
    ///
    /// let registry = ServiceRegistry::new();
    /// registry.add_collection_instance_trait(Arc::new(A) as Arc<dyn Plugin>).unwrap();
    /// registry.add_collection_instance_trait(Arc::new(B) as Arc<dyn Plugin>).unwrap();
    ///
    /// let names: Vec<String> = registry
    ///     .get_all_trait::<dyn Plugin>()
    ///     .unwrap()
    ///     .iter()
    ///     .map(|p| p.name().to_string())
    ///     .collect();
    /// assert_eq!(names, vec!["a", "b"]);
    /// ```
    fn get_all_trait<T: ?Sized + 'static + Send + Sync>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&Key::of_trait::<T>())?
            .into_iter()
            .map(downcast_trait::<T>)
            .collect()
    }

    /// Resolves a concrete service type, panicking on failure.
    fn get_required<T: 'static + Send + Sync>(&self) -> Arc<T> {
        self.get::<T>().unwrap_or_else(|e| {
            panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e)
        })
    }

    /// Resolves a named concrete service type, panicking on failure.
    fn get_named_required<T: 'static + Send + Sync>(&self, name: &'static str) -> Arc<T> {
        self.get_named::<T>(name).unwrap_or_else(|e| {
            panic!("Failed to resolve {}[\"{}\"]: {}", std::any::type_name::<T>(), name, e)
        })
    }

    /// Resolves a trait contract, panicking on failure.
    fn get_required_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Arc<T> {
        self.get_trait::<T>().unwrap_or_else(|e| {
            panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e)
        })
    }

    /// Whether a singular binding for `T` is reachable.
    fn contains_type<T: 'static>(&self) -> bool {
        self.contains_key(&Key::of::<T>())
    }

    /// Releases `service` when the registry owning this resolver closes.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.push_disposer(
            std::any::type_name::<T>().to_string(),
            Box::new(move || service.dispose()),
        );
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

fn downcast<T: 'static + Send + Sync>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

// Trait values are stored as Arc<Arc<dyn Trait>>
fn downcast_trait<T: ?Sized + 'static + Send + Sync>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}
