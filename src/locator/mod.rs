//! Service locator: discovery of contract implementations contributed by plugins.
//!
//! A contract is a `dyn Trait` type implementing [`ServiceContract`]. Plugins
//! declare their implementations in provider-configuration resources named
//! after the contract, one fully-qualified implementation name per line. The
//! locator reads those resources from a [`SearchContext`], loads each named
//! [`Implementation`], and instantiates it through its richest constructor
//! whose parameters a registry can satisfy.
//!
//! ```
//! use service_registry::{
//!     Implementation, Key, Resolver, ServiceContract, ServiceLocator, ServiceRegistry,
//!     StaticSearchContext,
//! };
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! impl ServiceContract for dyn Greeter {
//!     const NAME: &'static str = "org.example.Greeter";
//! }
//!
//! struct English(Arc<String>);
//! impl Greeter for English {
//!     fn greet(&self) -> String { format!("hello {}", self.0) }
//! }
//!
//! let context = StaticSearchContext::new("app")
//!     .with_resource("META-INF/services/org.example.Greeter", "org.example.English\n")
//!     .with_implementation(
//!         Implementation::new("org.example.English")
//!             .constructor::<dyn Greeter, _>(&[Key::of::<String>()], |r| {
//!                 Ok(Arc::new(English(r.get::<String>()?)) as Arc<dyn Greeter>)
//!             }),
//!     );
//!
//! let registry = ServiceRegistry::new();
//! registry.add_instance("world".to_string()).unwrap();
//!
//! let locator = ServiceLocator::new();
//! let greeters = locator.find_all::<dyn Greeter>(&context, &registry).unwrap();
//! assert_eq!(greeters.len(), 1);
//! assert_eq!(greeters[0].instance.greet(), "hello world");
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binding::{erase_ctor, AnyArc, Ctor};
use crate::config::LocatorConfig;
use crate::error::{DiError, DiResult};
use crate::internal::{Acquire, ResolutionFrame, ServiceStateCell};
use crate::key::Key;
use crate::registry::{ResolverContext, ServiceRegistry};
use crate::traits::ResolverCore;

pub mod context;
mod provider_config;

pub use context::{DirectorySearchContext, ImplementationTable, Resource, SearchContext, StaticSearchContext};

/// An extension contract discoverable through provider configurations.
///
/// Implement this for the `dyn Trait` type of the contract. `NAME` is the
/// stable, fully-qualified name the provider-configuration resource is named
/// after.
pub trait ServiceContract: Send + Sync + 'static {
    const NAME: &'static str;
}

/// One way of building an implementation as a given contract.
pub struct Constructor {
    contract: TypeId,
    contract_name: &'static str,
    parameters: Vec<Key>,
    build: Ctor,
}

impl Constructor {
    /// Name of the contract this constructor produces.
    pub fn contract_name(&self) -> &'static str {
        self.contract_name
    }

    /// Declared parameter keys, injected from the registry.
    pub fn parameters(&self) -> &[Key] {
        &self.parameters
    }
}

/// A loadable implementation: a fully-qualified name and its constructors.
pub struct Implementation {
    name: String,
    constructors: Vec<Constructor>,
}

impl Implementation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a constructor producing the contract `C`.
    ///
    /// `parameters` are resolved from the registry, left-to-right, before
    /// `build` runs; `build` usually fetches them again through the context,
    /// which returns the cached values.
    pub fn constructor<C, F>(mut self, parameters: &[Key], build: F) -> Self
    where
        C: ?Sized + ServiceContract,
        F: Fn(&ResolverContext<'_>) -> DiResult<Arc<C>> + Send + Sync + 'static,
    {
        self.constructors.push(Constructor {
            contract: TypeId::of::<C>(),
            contract_name: C::NAME,
            parameters: parameters.to_vec(),
            build: erase_ctor(move |r| build(r).map(|value| Arc::new(value) as AnyArc)),
        });
        self
    }

    /// Whether any constructor produces the contract `C`.
    pub fn implements<C: ?Sized + ServiceContract>(&self) -> bool {
        self.constructors.iter().any(|c| c.contract == TypeId::of::<C>())
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }
}

/// A discovered and instantiated implementation of a contract.
pub struct Located<C: ?Sized> {
    /// Contract name
    pub contract: &'static str,
    /// Fully-qualified implementation name
    pub implementation: String,
    /// Name of the search context it was discovered in
    pub context: String,
    /// The instance
    pub instance: Arc<C>,
}

impl<C: ?Sized> Clone for Located<C> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract,
            implementation: self.implementation.clone(),
            context: self.context.clone(),
            instance: self.instance.clone(),
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for Located<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Located")
            .field("contract", &self.contract)
            .field("implementation", &self.implementation)
            .field("context", &self.context)
            .finish()
    }
}

/// Contract, loaded implementation (by address) and injecting registry node.
type InstanceKey = (TypeId, usize, usize);

struct CachedInstance {
    // Pins the implementation so its address stays unique while cached.
    _implementation: Arc<Implementation>,
    cell: Arc<ServiceStateCell>,
}

/// Discovers and instantiates contract implementations.
///
/// Instances are cached per contract, loaded implementation and injecting
/// registry, so repeated lookups against the same context and registry
/// return the same instances. Contexts that merely share a name do not share
/// instances. The locator never registers anything into a registry.
pub struct ServiceLocator {
    config: LocatorConfig,
    instances: Mutex<HashMap<InstanceKey, CachedInstance>>,
}

impl ServiceLocator {
    pub fn new() -> Self {
        Self::with_config(LocatorConfig::default())
    }

    pub fn with_config(config: LocatorConfig) -> Self {
        Self {
            config,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Implementation names declared for `C`, in discovery then declaration
    /// order, de-duplicated. Nothing is loaded or instantiated.
    pub fn implementation_names<C: ?Sized + ServiceContract>(&self, context: &dyn SearchContext) -> DiResult<Vec<String>> {
        let resource_name = self.config.resource_name(C::NAME);
        let mut names = Vec::new();
        for resource in context.resources(&resource_name)? {
            let content = std::str::from_utf8(&resource.content).map_err(|e| DiError::ServiceImplementation {
                contract: C::NAME,
                implementation: resource.origin.clone(),
                reason: format!("provider configuration is not valid UTF-8: {}", e),
            })?;
            provider_config::parse_into(content, self.config.comment_marker, &mut names);
        }
        tracing::debug!(contract = C::NAME, context = context.name(), found = names.len(), "scanned provider configurations");
        Ok(names)
    }

    /// Finds and instantiates every implementation of `C` declared in `context`.
    ///
    /// Constructor parameters are injected from `registry`.
    pub fn find_all<C: ?Sized + ServiceContract>(
        &self,
        context: &dyn SearchContext,
        registry: &ServiceRegistry,
    ) -> DiResult<Vec<Located<C>>> {
        self.implementation_names::<C>(context)?
            .into_iter()
            .map(|name| self.locate::<C>(name, context, registry))
            .collect()
    }

    /// Finds and instantiates the first implementation of `C` declared in `context`.
    pub fn find_first<C: ?Sized + ServiceContract>(
        &self,
        context: &dyn SearchContext,
        registry: &ServiceRegistry,
    ) -> DiResult<Located<C>> {
        match self.implementation_names::<C>(context)?.into_iter().next() {
            Some(name) => self.locate::<C>(name, context, registry),
            None => Err(DiError::UnknownService {
                key: Key::of_trait::<C>(),
            }),
        }
    }

    fn locate<C: ?Sized + ServiceContract>(
        &self,
        name: String,
        context: &dyn SearchContext,
        registry: &ServiceRegistry,
    ) -> DiResult<Located<C>> {
        let implementation = context.load(&name).ok_or_else(|| DiError::ServiceImplementation {
            contract: C::NAME,
            implementation: name.clone(),
            reason: format!("implementation not found in '{}'", context.name()),
        })?;
        if !implementation.implements::<C>() {
            return Err(DiError::ServiceImplementation {
                contract: C::NAME,
                implementation: name,
                reason: "does not implement the contract".to_string(),
            });
        }

        let cache_key = (
            TypeId::of::<C>(),
            Arc::as_ptr(&implementation) as usize,
            registry.id(),
        );
        let cell = self
            .instances
            .lock()
            .entry(cache_key)
            .or_insert_with(|| CachedInstance {
                _implementation: implementation.clone(),
                cell: Arc::new(ServiceStateCell::new()),
            })
            .cell
            .clone();

        let key = Key::of_trait::<C>();
        let value = match cell.acquire(&key) {
            Acquire::Ready(result) => result?,
            Acquire::Create(guard) => {
                let _frame = ResolutionFrame::push(cell.id(), key);
                let result = instantiate::<C>(&implementation, registry);
                guard.complete(result)?
            }
        };
        let instance = value
            .downcast::<Arc<C>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| DiError::TypeMismatch(C::NAME))?;

        Ok(Located {
            contract: C::NAME,
            implementation: name,
            context: context.name().to_string(),
            instance,
        })
    }
}

impl Default for ServiceLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds `implementation` through its richest constructor whose parameters
/// all resolve against `registry`; ties go to the first declared.
fn instantiate<C: ?Sized + ServiceContract>(implementation: &Implementation, registry: &ServiceRegistry) -> DiResult<AnyArc> {
    let mut candidates: Vec<&Constructor> = implementation
        .constructors
        .iter()
        .filter(|c| c.contract == TypeId::of::<C>())
        .collect();
    candidates.sort_by(|a, b| b.parameters.len().cmp(&a.parameters.len()));

    let chosen = candidates
        .iter()
        .find(|c| c.parameters.iter().all(|key| registry.contains(key)));
    let Some(chosen) = chosen else {
        let missing = candidates
            .first()
            .map(|richest| {
                richest
                    .parameters
                    .iter()
                    .filter(|key| !registry.contains(key))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        return Err(DiError::UnresolvableDependency {
            implementation: implementation.name.clone(),
            missing,
        });
    };

    tracing::debug!(
        contract = C::NAME,
        implementation = %implementation.name,
        parameters = chosen.parameters.len(),
        "instantiating implementation"
    );
    let ctx = ResolverContext::new(registry);
    for parameter in &chosen.parameters {
        ctx.resolve_any(parameter)?;
    }
    (chosen.build)(&ctx).map_err(|err| match err {
        DiError::Custom(cause) => DiError::ServiceCreation {
            key: Key::of_trait::<C>(),
            cause,
        },
        other => other,
    })
}
