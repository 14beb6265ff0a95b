//! The service registry node.
//!
//! A [`ServiceRegistry`] owns a binding table and the state cells of its
//! factory bindings. Lookups fall through its own bindings, then its composed
//! registries, then its parent. Handles are cheap to clone; every clone refers
//! to the same node.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::binding::{AnyArc, Binding, BindingEntry, BindingKind, BindingTable};
use crate::config::RegistryConfig;
use crate::error::{BoxError, DiError, DiResult, DisposalFailure};
use crate::internal::{Acquire, DisposeBag, ResolutionFrame, VisitGuard};
use crate::key::Key;
use crate::observer::{Observers, RegistryObserver, TracingObserver};
use crate::traits::ResolverCore;

pub mod context;
pub mod module;
mod registration;

pub use context::ResolverContext;
pub use module::{ServiceModule, ServiceRegistryModuleExt};

static NEXT_REGISTRY_ID: AtomicUsize = AtomicUsize::new(1);

/// Hierarchical, lazily-evaluated service container.
///
/// # Resolution
///
/// `get(key)` looks in three places, in order:
///
/// 1. this node's singular binding for `key`, creating and caching the value
///    on first use;
/// 2. the composed registries, in composition order. Exactly one of them may
///    be able to satisfy `key`; two or more is an
///    [`AmbiguousService`](DiError::AmbiguousService) error;
/// 3. the parent registry, recursively.
///
/// Composed registries are searched through their own bindings and their own
/// composed registries only, never through their parents.
///
/// # Thread Safety
///
/// A factory runs at most once, even when several threads request its key at
/// the same time. Late requesters block on that binding's state cell until
/// the winner finishes; requests for other keys proceed independently.
///
/// # Examples
///
/// ```
/// use service_registry::{ServiceRegistry, Resolver};
/// use std::sync::Arc;
///
/// struct Logger { prefix: String }
/// struct Service { logger: Arc<Logger> }
///
/// let root = ServiceRegistry::named("root");
/// root.add_instance(Logger { prefix: "[root]".to_string() }).unwrap();
///
/// let child = root.create_child("child");
/// child
///     .add_factory::<Service, _>(|r| Ok(Service { logger: r.get::<Logger>()? }))
///     .unwrap();
///
/// let service = child.get_required::<Service>();
/// assert_eq!(service.logger.prefix, "[root]");
/// assert!(Arc::ptr_eq(&service, &child.get_required::<Service>()));
/// ```
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    id: usize,
    name: String,
    table: RwLock<BindingTable>,
    composed: RwLock<Vec<ServiceRegistry>>,
    parent: Option<ServiceRegistry>,
    children: Mutex<Vec<Weak<RegistryInner>>>,
    disposers: Mutex<DisposeBag>,
    observers: RwLock<Observers>,
    closed: AtomicBool,
}

impl ServiceRegistry {
    /// Creates an empty root registry with a generated name.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Creates an empty root registry with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(RegistryConfig::named(name))
    }

    /// Creates an empty root registry from a config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates an empty registry whose lookups fall back to `parent`.
    ///
    /// The parent keeps a weak handle to the child so that closing the
    /// parent closes the child first.
    pub fn with_parent(parent: &ServiceRegistry, config: RegistryConfig) -> Self {
        let child = Self::build(config, Some(parent.clone()));
        let mut children = parent.inner.children.lock();
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(&child.inner));
        drop(children);
        child
    }

    /// Creates a named child scope of this registry.
    pub fn create_child(&self, name: impl Into<String>) -> Self {
        Self::with_parent(self, RegistryConfig::named(name))
    }

    fn build(config: RegistryConfig, parent: Option<ServiceRegistry>) -> Self {
        let id = NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed);
        let name = config.name.unwrap_or_else(|| format!("registry-{}", id));
        let mut observers = Observers::default();
        if config.trace_resolution {
            observers.push(Arc::new(TracingObserver));
        }
        tracing::trace!(registry = %name, parent = parent.as_ref().map(|p| p.name()), "registry created");
        Self {
            inner: Arc::new(RegistryInner {
                id,
                name,
                table: RwLock::new(BindingTable::new()),
                composed: RwLock::new(Vec::new()),
                parent,
                children: Mutex::new(Vec::new()),
                disposers: Mutex::new(DisposeBag::default()),
                observers: RwLock::new(observers),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The registry's display name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The parent registry, if any.
    pub fn parent(&self) -> Option<&ServiceRegistry> {
        self.inner.parent.as_ref()
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) fn id(&self) -> usize {
        self.inner.id
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &ServiceRegistry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attaches an observer to this node.
    pub fn add_observer(&self, observer: Arc<dyn RegistryObserver>) {
        self.inner.observers.write().push(observer);
    }

    /// Keys bound directly in this node, in registration order.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.table.read().keys()
    }

    /// Number of bindings declared directly in this node.
    pub fn binding_count(&self) -> usize {
        self.inner.table.read().len()
    }

    /// Adds a binding for `key` to this node.
    ///
    /// Fails with [`DuplicateBinding`](DiError::DuplicateBinding) when a
    /// singular binding for `key` already exists here. Bindings in parents or
    /// composed registries do not conflict.
    pub fn register(&self, key: Key, binding: Binding) -> DiResult<()> {
        self.ensure_open()?;
        tracing::trace!(registry = %self.inner.name, service = %key, binding = ?binding, "registering binding");
        self.inner.table.write().insert(key, binding, &self.inner.name)
    }

    /// Appends `other` to the composed registries searched by this node.
    ///
    /// Composition is read-through: `other` keeps ownership of its bindings
    /// and instances, and gains no access to this node.
    pub fn compose(&self, other: ServiceRegistry) -> DiResult<()> {
        self.ensure_open()?;
        if self.ptr_eq(&other) {
            tracing::warn!(registry = %self.inner.name, "ignoring attempt to compose a registry with itself");
            return Ok(());
        }
        tracing::debug!(registry = %self.inner.name, composed = %other.inner.name, "composing registry");
        self.inner.composed.write().push(other);
        Ok(())
    }

    /// Composed registries, in composition order.
    pub fn composed(&self) -> Vec<ServiceRegistry> {
        self.inner.composed.read().clone()
    }

    /// Resolves `key`; see the type-level docs for the search order.
    pub fn get_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.ensure_open()?;
        if let Some(value) = self.resolve_local(key)? {
            return Ok(value);
        }
        match &self.inner.parent {
            Some(parent) => {
                tracing::trace!(registry = %self.inner.name, parent = %parent.inner.name, service = %key, "delegating to parent");
                parent.get_any(key)
            }
            None => Err(DiError::UnknownService { key: *key }),
        }
    }

    /// Resolves every binding for `key` from this node, its composed
    /// registries and its parent chain. Never fails on zero matches.
    pub fn get_all_any(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.ensure_open()?;
        let mut values = self.resolve_all_local(key)?;
        if let Some(parent) = &self.inner.parent {
            values.extend(parent.get_all_any(key)?);
        }
        Ok(values)
    }

    /// Whether `get_any(key)` would find a binding.
    pub fn contains(&self, key: &Key) -> bool {
        if self.is_closed() {
            return false;
        }
        self.satisfies_locally(key)
            || self
                .inner
                .parent
                .as_ref()
                .map_or(false, |parent| parent.contains(key))
    }

    /// Releases the instances this node created and closes it.
    ///
    /// Live child scopes are closed first, newest first. Then this node's
    /// release operations run in reverse creation order. Failures are
    /// collected into a single [`Disposal`](DiError::Disposal) error after
    /// every release has been attempted. Instances obtained from parents or
    /// composed registries are left to their owners. Closing twice is a
    /// no-op.
    pub fn close(&self) -> DiResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(registry = %self.inner.name, "closing registry");

        let mut failures: Vec<DisposalFailure> = Vec::new();

        let children: Vec<ServiceRegistry> = self
            .inner
            .children
            .lock()
            .drain(..)
            .filter_map(|weak| weak.upgrade())
            .map(|inner| ServiceRegistry { inner })
            .collect();
        for child in children.iter().rev() {
            match child.close() {
                Ok(()) => {}
                Err(DiError::Disposal { failures: child_failures, .. }) => failures.extend(child_failures),
                Err(other) => failures.push(DisposalFailure {
                    service: child.name().to_string(),
                    message: other.to_string(),
                }),
            }
        }

        let bag = self.inner.disposers.lock().take();
        let observers = self.inner.observers.read().clone();
        let name = self.inner.name.clone();
        failures.extend(bag.run_all_reverse(|service| observers.disposed(&name, service)));

        // Composition may form reference cycles (a plugin registry whose
        // parent is the root that composes it); closing breaks them.
        self.inner.composed.write().clear();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal {
                registry: self.inner.name.clone(),
                failures,
            })
        }
    }

    fn ensure_open(&self) -> DiResult<()> {
        if self.is_closed() {
            Err(DiError::RegistryClosed {
                registry: self.inner.name.clone(),
            })
        } else {
            Ok(())
        }
    }

    /// Own singular binding, or a composed registry that can satisfy `key`.
    fn satisfies_locally(&self, key: &Key) -> bool {
        let Some(_visit) = VisitGuard::enter(self.inner.id) else {
            return false;
        };
        if self.inner.table.read().has_singular(key) {
            return true;
        }
        let composed = self.inner.composed.read().clone();
        composed.iter().any(|c| c.satisfies_locally(key))
    }

    /// Steps 1 and 2 of the search: own bindings, then composed registries.
    fn resolve_local(&self, key: &Key) -> DiResult<Option<AnyArc>> {
        let Some(_visit) = VisitGuard::enter(self.inner.id) else {
            return Ok(None);
        };

        let entry = self.inner.table.read().singular(key);
        if let Some(entry) = entry {
            return self.resolve_entry(&entry).map(Some);
        }

        let composed = self.inner.composed.read().clone();
        let candidates: Vec<&ServiceRegistry> = composed
            .iter()
            .filter(|c| c.satisfies_locally(key))
            .collect();
        match candidates.as_slice() {
            [] => Ok(None),
            [single] => {
                tracing::trace!(registry = %self.inner.name, composed = %single.inner.name, service = %key, "delegating to composed registry");
                single.ensure_open()?;
                single.resolve_local(key)
            }
            many => Err(DiError::AmbiguousService {
                key: *key,
                candidates: many.iter().map(|c| c.inner.name.clone()).collect(),
            }),
        }
    }

    fn resolve_all_local(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        let Some(_visit) = VisitGuard::enter(self.inner.id) else {
            return Ok(Vec::new());
        };
        let entries = self.inner.table.read().all(key);
        let mut values = Vec::with_capacity(entries.len());
        for entry in &entries {
            values.push(self.resolve_entry(entry)?);
        }
        let composed = self.inner.composed.read().clone();
        for registry in &composed {
            registry.ensure_open()?;
            values.extend(registry.resolve_all_local(key)?);
        }
        Ok(values)
    }

    fn resolve_entry(&self, entry: &Arc<BindingEntry>) -> DiResult<AnyArc> {
        if let BindingKind::Instance(value) = &entry.binding.kind {
            return Ok(value.clone());
        }

        match entry.cell.acquire(&entry.key) {
            Acquire::Ready(result) => result,
            Acquire::Create(guard) => {
                let _frame = ResolutionFrame::push(entry.cell.id(), entry.key);
                let observers = self.inner.observers.read().clone();
                observers.resolving(&self.inner.name, &entry.key);
                tracing::debug!(registry = %self.inner.name, service = %entry.key, "creating service");

                let started = Instant::now();
                let result = self.invoke(entry);

                if let (Ok(value), Some(disposer)) = (&result, &entry.binding.disposer) {
                    let value = value.clone();
                    let disposer = disposer.clone();
                    self.push_disposer(entry.key.to_string(), Box::new(move || disposer(&value)));
                }

                let result = guard.complete(result);
                match &result {
                    Ok(_) => observers.created(&self.inner.name, &entry.key, started.elapsed()),
                    Err(err) => {
                        tracing::warn!(registry = %self.inner.name, service = %entry.key, error = %err, "service creation failed");
                        observers.creation_failed(&self.inner.name, &entry.key, err);
                    }
                }
                result
            }
        }
    }

    /// Runs a factory or decorator: declared dependencies first, left-to-right.
    fn invoke(&self, entry: &BindingEntry) -> DiResult<AnyArc> {
        let ctx = ResolverContext::new(self);
        for dependency in &entry.binding.dependencies {
            ctx.resolve_any(dependency)?;
        }
        let result = match &entry.binding.kind {
            BindingKind::Instance(value) => Ok(value.clone()),
            BindingKind::Factory(ctor) => ctor(&ctx),
            BindingKind::Decorator(ctor) => {
                let parent = self
                    .inner
                    .parent
                    .as_ref()
                    .ok_or(DiError::UnknownService { key: entry.key })?;
                let inner = parent.get_any(&entry.key)?;
                ctor(&ctx, inner)
            }
        };
        result.map_err(|err| match err {
            DiError::Custom(cause) => DiError::ServiceCreation { key: entry.key, cause },
            other => other,
        })
    }
}

impl ResolverCore for ServiceRegistry {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.get_any(key)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.get_all_any(key)
    }

    fn contains_key(&self, key: &Key) -> bool {
        self.contains(key)
    }

    fn push_disposer(&self, service: String, hook: Box<dyn FnOnce() -> Result<(), BoxError> + Send>) {
        let mut bag = self.inner.disposers.lock();
        // `close()` marks the node closed before draining the bag, so a hook
        // arriving after that point would never run.
        if !self.is_closed() {
            bag.push(service, hook);
            return;
        }
        drop(bag);

        tracing::debug!(registry = %self.inner.name, service = %service, "registry already closed, releasing service now");
        match hook() {
            Ok(()) => {
                let observers = self.inner.observers.read().clone();
                observers.disposed(&self.inner.name, &service);
            }
            Err(err) => {
                tracing::warn!(registry = %self.inner.name, service = %service, error = %err, "failed to release service");
            }
        }
    }
}

impl Clone for ServiceRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("name", &self.inner.name)
            .field("bindings", &self.inner.table.read().len())
            .field(
                "composed",
                &self
                    .inner
                    .composed
                    .read()
                    .iter()
                    .map(|c| c.inner.name.clone())
                    .collect::<Vec<_>>(),
            )
            .field("parent", &self.inner.parent.as_ref().map(|p| p.inner.name.clone()))
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_scopes_are_not_retained_by_the_parent() {
        let root = ServiceRegistry::named("root");
        for i in 0..1_000 {
            drop(root.create_child(format!("scope-{}", i)));
        }
        let live = root.create_child("live");
        assert_eq!(root.inner.children.lock().len(), 1);

        drop(live);
        root.close().unwrap();
        assert!(root.inner.children.lock().is_empty());
    }
}
