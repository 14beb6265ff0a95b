//! Typed registration API.

use std::sync::Arc;

use crate::binding::{AnyArc, Binding};
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::traits::Dispose;

use super::{ResolverContext, ServiceRegistry};

impl ServiceRegistry {
    // ----- Instances -----

    /// Registers a pre-built value for the concrete type `T`.
    ///
    /// ```rust
    /// # use service_registry::{ServiceRegistry, Resolver};
    /// struct Config { database_url: String }
    ///
    /// let registry = ServiceRegistry::new();
    /// registry.add_instance(Config { database_url: "postgres://localhost".to_string() }).unwrap();
    /// assert_eq!(registry.get_required::<Config>().database_url, "postgres://localhost");
    /// ```
    pub fn add_instance<T: 'static + Send + Sync>(&self, value: T) -> DiResult<&Self> {
        self.register(Key::of::<T>(), Binding::instance(Arc::new(value)))?;
        Ok(self)
    }

    /// Registers a pre-built value for `T` qualified by `name`.
    pub fn add_named_instance<T: 'static + Send + Sync>(&self, name: &'static str, value: T) -> DiResult<&Self> {
        self.register(Key::named::<T>(name), Binding::instance(Arc::new(value)))?;
        Ok(self)
    }

    /// Registers a pre-built implementation of the trait contract `T`.
    pub fn add_instance_trait<T: ?Sized + 'static + Send + Sync>(&self, value: Arc<T>) -> DiResult<&Self> {
        self.register(Key::of_trait::<T>(), Binding::instance(Arc::new(value)))?;
        Ok(self)
    }

    /// Registers a pre-built implementation of `T` qualified by `name`.
    pub fn add_named_instance_trait<T: ?Sized + 'static + Send + Sync>(
        &self,
        name: &'static str,
        value: Arc<T>,
    ) -> DiResult<&Self> {
        self.register(Key::named_trait::<T>(name), Binding::instance(Arc::new(value)))?;
        Ok(self)
    }

    // ----- Factories -----

    /// Registers a factory creating `T` on first request.
    ///
    /// The factory runs at most once. Its value, or its error, is cached and
    /// returned on every later request.
    ///
    /// ```rust
    /// # use service_registry::{ServiceRegistry, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct UserService { db: Arc<Database> }
    ///
    /// let registry = ServiceRegistry::new();
    /// registry.add_instance(Database { url: "postgres://localhost".to_string() }).unwrap();
    /// registry
    ///     .add_factory::<UserService, _>(|r| Ok(UserService { db: r.get::<Database>()? }))
    ///     .unwrap();
    ///
    /// let a = registry.get_required::<UserService>();
    /// let b = registry.get_required::<UserService>();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    pub fn add_factory<T, F>(&self, factory: F) -> DiResult<&Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(Key::of::<T>(), typed_factory(factory))?;
        Ok(self)
    }

    /// Registers a factory whose declared dependencies are resolved, in order,
    /// before it runs.
    pub fn add_factory_with_deps<T, F>(&self, dependencies: &[Key], factory: F) -> DiResult<&Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let binding = dependencies
            .iter()
            .fold(typed_factory(factory), |binding, key| binding.depends_on(*key));
        self.register(Key::of::<T>(), binding)?;
        Ok(self)
    }

    /// Registers a factory for `T` qualified by `name`.
    pub fn add_named_factory<T, F>(&self, name: &'static str, factory: F) -> DiResult<&Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register(Key::named::<T>(name), typed_factory(factory))?;
        Ok(self)
    }

    /// Registers a factory for the trait contract `T`.
    pub fn add_factory_trait<T, F>(&self, factory: F) -> DiResult<&Self>
    where
        T: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register(Key::of_trait::<T>(), trait_factory(factory))?;
        Ok(self)
    }

    /// Registers a factory for `T` whose value is released on `close()`.
    pub fn add_disposable_factory<T, F>(&self, factory: F) -> DiResult<&Self>
    where
        T: Dispose,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let binding = typed_factory(factory).with_disposer(|value: &AnyArc| match value.downcast_ref::<T>() {
            Some(service) => service.dispose(),
            None => Ok(()),
        });
        self.register(Key::of::<T>(), binding)?;
        Ok(self)
    }

    // ----- Decorators -----

    /// Registers a decorator for `T` wrapping the value provided by the parent.
    ///
    /// ```rust
    /// # use service_registry::{ServiceRegistry, Resolver};
    /// # use std::sync::Arc;
    /// struct Greeting(String);
    ///
    /// let parent = ServiceRegistry::named("build");
    /// parent.add_instance(Greeting("hello".to_string())).unwrap();
    ///
    /// let child = parent.create_child("project");
    /// child
    ///     .add_decorator::<Greeting, _>(|_, inner| Ok(Greeting(format!("{} world", inner.0))))
    ///     .unwrap();
    ///
    /// assert_eq!(child.get_required::<Greeting>().0, "hello world");
    /// assert_eq!(parent.get_required::<Greeting>().0, "hello");
    /// ```
    pub fn add_decorator<T, F>(&self, decorator: F) -> DiResult<&Self>
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext<'_>, Arc<T>) -> DiResult<T> + Send + Sync + 'static,
    {
        let binding = Binding::decorator(move |r, inner: AnyArc| {
            let inner = inner
                .downcast::<T>()
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
            decorator(r, inner).map(|value| Arc::new(value) as AnyArc)
        });
        self.register(Key::of::<T>(), binding)?;
        Ok(self)
    }

    /// Registers a decorator for the trait contract `T`.
    pub fn add_decorator_trait<T, F>(&self, decorator: F) -> DiResult<&Self>
    where
        T: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext<'_>, Arc<T>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        let binding = Binding::decorator(move |r, inner: AnyArc| {
            let inner = inner
                .downcast::<Arc<T>>()
                .map(|boxed| (*boxed).clone())
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
            decorator(r, inner).map(|value| Arc::new(value) as AnyArc)
        });
        self.register(Key::of_trait::<T>(), binding)?;
        Ok(self)
    }

    // ----- Collections -----

    /// Adds a pre-built contribution to the `get_all` fan-out of `T`.
    pub fn add_collection_instance_trait<T: ?Sized + 'static + Send + Sync>(&self, value: Arc<T>) -> DiResult<&Self> {
        self.register(Key::of_trait::<T>(), Binding::instance(Arc::new(value)).collection())?;
        Ok(self)
    }

    /// Adds a lazily created contribution to the `get_all` fan-out of `T`.
    pub fn add_collection_factory_trait<T, F>(&self, factory: F) -> DiResult<&Self>
    where
        T: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register(Key::of_trait::<T>(), trait_factory(factory).collection())?;
        Ok(self)
    }
}

fn typed_factory<T, F>(factory: F) -> Binding
where
    T: 'static + Send + Sync,
    F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
{
    Binding::factory(move |r| factory(r).map(|value| Arc::new(value) as AnyArc))
}

fn trait_factory<T, F>(factory: F) -> Binding
where
    T: ?Sized + 'static + Send + Sync,
    F: Fn(&ResolverContext<'_>) -> DiResult<Arc<T>> + Send + Sync + 'static,
{
    Binding::factory(move |r| factory(r).map(|value| Arc::new(value) as AnyArc))
}
