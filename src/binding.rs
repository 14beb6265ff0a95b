//! Bindings and the per-node binding table.

use std::any::Any;
use std::sync::Arc;

use crate::error::{BoxError, DiError, DiResult};
use crate::internal::ServiceStateCell;
use crate::key::Key;
use crate::registry::ResolverContext;

/// Type-erased Arc for storage
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type DecoratorCtor =
    Arc<dyn Fn(&ResolverContext<'_>, AnyArc) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type Disposer = Arc<dyn Fn(&AnyArc) -> Result<(), BoxError> + Send + Sync>;

/// Erases a typed constructor closure into a [`Ctor`].
pub(crate) fn erase_ctor<F>(ctor: F) -> Ctor
where
    F: Fn(&ResolverContext<'_>) -> DiResult<AnyArc> + Send + Sync + 'static,
{
    Arc::new(ctor)
}

#[cfg(feature = "ahash")]
type Map<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
#[cfg(not(feature = "ahash"))]
type Map<K, V> = std::collections::HashMap<K, V>;

/// Whether a binding answers single lookups or only fan-out lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Satisfies `get` and takes part in `get_all`; at most one per key and node
    Singular,
    /// Takes part in `get_all` only; any number per key and node
    Collection,
}

pub(crate) enum BindingKind {
    Instance(AnyArc),
    Factory(Ctor),
    /// Own factory plus a handle to the same key resolved from the parent
    Decorator(DecoratorCtor),
}

/// Strategy for satisfying a capability key.
///
/// Most code registers through the typed `add_*` methods of
/// [`ServiceRegistry`](crate::ServiceRegistry); `Binding` is the untyped form
/// those methods build, for callers that work with [`Key`]s directly.
///
/// ```rust
/// use service_registry::{Binding, Key, ServiceRegistry, Resolver, AnyArc};
/// use std::sync::Arc;
///
/// let registry = ServiceRegistry::new();
/// registry.register(Key::of::<u16>(), Binding::instance(Arc::new(8080u16))).unwrap();
/// registry
///     .register(
///         Key::of::<String>(),
///         Binding::factory(|r| {
///             let port = r.get::<u16>()?;
///             Ok(Arc::new(format!("localhost:{}", port)) as AnyArc)
///         })
///         .depends_on(Key::of::<u16>()),
///     )
///     .unwrap();
///
/// assert_eq!(*registry.get_required::<String>(), "localhost:8080");
/// ```
pub struct Binding {
    pub(crate) kind: BindingKind,
    pub(crate) cardinality: Cardinality,
    pub(crate) dependencies: Vec<Key>,
    pub(crate) disposer: Option<Disposer>,
}

impl Binding {
    fn new(kind: BindingKind) -> Self {
        Self {
            kind,
            cardinality: Cardinality::Singular,
            dependencies: Vec::new(),
            disposer: None,
        }
    }

    /// A pre-built value, available immediately.
    pub fn instance(value: AnyArc) -> Self {
        Self::new(BindingKind::Instance(value))
    }

    /// A factory invoked at most once; its outcome is cached.
    pub fn factory<F>(ctor: F) -> Self
    where
        F: Fn(&ResolverContext<'_>) -> DiResult<AnyArc> + Send + Sync + 'static,
    {
        Self::new(BindingKind::Factory(erase_ctor(ctor)))
    }

    /// A factory that receives the same key resolved from the parent registry.
    ///
    /// Declared dependencies must not include the decorated key itself; the
    /// parent value is passed in directly.
    pub fn decorator<F>(ctor: F) -> Self
    where
        F: Fn(&ResolverContext<'_>, AnyArc) -> DiResult<AnyArc> + Send + Sync + 'static,
    {
        Self::new(BindingKind::Decorator(Arc::new(ctor)))
    }

    /// Declares a dependency, resolved before the factory runs.
    ///
    /// Dependencies are resolved left-to-right in declaration order.
    pub fn depends_on(mut self, key: Key) -> Self {
        self.dependencies.push(key);
        self
    }

    /// Marks the binding as a fan-out contribution (only visible to `get_all`).
    pub fn collection(mut self) -> Self {
        self.cardinality = Cardinality::Collection;
        self
    }

    /// Installs a release operation run on `close()` for a created value.
    pub fn with_disposer<F>(mut self, disposer: F) -> Self
    where
        F: Fn(&AnyArc) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.disposer = Some(Arc::new(disposer));
        self
    }

    /// The declared cardinality.
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// The declared dependency keys.
    pub fn dependencies(&self) -> &[Key] {
        &self.dependencies
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            BindingKind::Instance(_) => "instance",
            BindingKind::Factory(_) => "factory",
            BindingKind::Decorator(_) => "decorator",
        };
        f.debug_struct("Binding")
            .field("kind", &kind)
            .field("cardinality", &self.cardinality)
            .field("dependencies", &self.dependencies)
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

/// A binding owned by a node, together with its state cell.
pub(crate) struct BindingEntry {
    pub(crate) key: Key,
    pub(crate) binding: Binding,
    pub(crate) cell: ServiceStateCell,
}

/// Per-node map from capability key to bindings, in registration order.
#[derive(Default)]
pub(crate) struct BindingTable {
    entries: Vec<Arc<BindingEntry>>,
    singular: Map<Key, usize>,
}

impl BindingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a binding; a second singular binding for a key is rejected.
    pub(crate) fn insert(&mut self, key: Key, binding: Binding, registry: &str) -> DiResult<()> {
        if binding.cardinality == Cardinality::Singular {
            if self.singular.contains_key(&key) {
                return Err(DiError::DuplicateBinding {
                    key,
                    registry: registry.to_string(),
                });
            }
            self.singular.insert(key, self.entries.len());
        }
        self.entries.push(Arc::new(BindingEntry {
            key,
            binding,
            cell: ServiceStateCell::new(),
        }));
        Ok(())
    }

    /// The singular binding for `key`, if any.
    #[inline]
    pub(crate) fn singular(&self, key: &Key) -> Option<Arc<BindingEntry>> {
        self.singular.get(key).map(|&idx| self.entries[idx].clone())
    }

    #[inline]
    pub(crate) fn has_singular(&self, key: &Key) -> bool {
        self.singular.contains_key(key)
    }

    /// Every binding for `key`, singular and collection, in registration order.
    pub(crate) fn all(&self, key: &Key) -> Vec<Arc<BindingEntry>> {
        self.entries.iter().filter(|e| &e.key == key).cloned().collect()
    }

    pub(crate) fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !keys.contains(&entry.key) {
                keys.push(entry.key);
            }
        }
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
