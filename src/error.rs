//! Error types for the service registry.

use std::sync::Arc;

use crate::key::Key;

/// Boxed error used for user-supplied failure causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single disposer that failed while a registry was closing.
#[derive(Debug, Clone)]
pub struct DisposalFailure {
    /// The service whose release operation failed
    pub service: String,
    /// Rendered failure message
    pub message: String,
}

impl std::fmt::Display for DisposalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.service, self.message)
    }
}

/// Registry, locator and plugin composition errors.
///
/// Every variant names the offending capability key and, where it helps,
/// the competing sources or the cycle path. Errors are `Clone` because a
/// failed creation is cached and re-raised on every later request.
///
/// # Examples
///
/// ```rust
/// use service_registry::{DiError, ServiceRegistry, Resolver};
///
/// let registry = ServiceRegistry::new();
/// match registry.get::<String>() {
///     Err(DiError::UnknownService { key }) => {
///         assert_eq!(key.display_name(), "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// A singular binding for this key already exists in the node
    #[error("duplicate binding for {key} in registry '{registry}'")]
    DuplicateBinding { key: Key, registry: String },

    /// No binding satisfies the key in this node, its composed registries or its parents
    #[error("no service of type {key} is registered")]
    UnknownService { key: Key },

    /// More than one composed registry can satisfy the key
    #[error("multiple services of type {key} available in composed registries: {}", candidates.join(", "))]
    AmbiguousService { key: Key, candidates: Vec<String> },

    /// Resolving the key requires resolving the key again
    #[error("circular dependency: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// A discovered implementation cannot be loaded or does not implement the contract
    #[error("could not use implementation '{implementation}' of {contract}: {reason}")]
    ServiceImplementation {
        contract: &'static str,
        implementation: String,
        reason: String,
    },

    /// No constructor of a discovered implementation has all parameters resolvable
    #[error("cannot create '{implementation}': no constructor is satisfiable, missing {}", display_keys(missing))]
    UnresolvableDependency { implementation: String, missing: Vec<Key> },

    /// A plugin's extension point failed while contributing services
    #[error("plugin '{plugin}' failed to contribute services: {cause}")]
    PluginContribution { plugin: String, cause: Box<DiError> },

    /// The registry has been closed
    #[error("registry '{registry}' has been closed")]
    RegistryClosed { registry: String },

    /// Type downcast failed
    #[error("type mismatch for: {0}")]
    TypeMismatch(&'static str),

    /// A factory returned a user error; the cause is shared by every re-raise
    #[error("could not create service of type {key}: {cause}")]
    ServiceCreation {
        key: Key,
        cause: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A factory panicked while the cell was being created
    #[error("factory for {key} panicked")]
    FactoryPanicked { key: Key },

    /// One or more release operations failed during close
    #[error("failed to release {} service(s) of registry '{registry}': {}", failures.len(), display_failures(failures))]
    Disposal {
        registry: String,
        failures: Vec<DisposalFailure>,
    },

    /// A provider-configuration resource could not be read
    #[error("could not read '{resource}': {message}")]
    Io { resource: String, message: String },

    /// A configuration document could not be parsed
    #[error("invalid {target} configuration: {message}")]
    Config { target: &'static str, message: String },

    /// Free-form error raised by user code inside a factory
    #[error(transparent)]
    Custom(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl DiError {
    /// Wraps an arbitrary error so a factory can return it.
    ///
    /// ```rust
    /// use service_registry::DiError;
    ///
    /// let err = DiError::custom(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
    /// assert_eq!(err.to_string(), "disk full");
    /// ```
    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DiError::Custom(Arc::new(err))
    }

    /// Wraps a plain message so a factory can return it.
    pub fn msg(message: impl Into<String>) -> Self {
        let boxed: BoxError = message.into().into();
        DiError::Custom(Arc::from(boxed))
    }

    /// Whether this error, or a plugin failure wrapping it, reports a cycle.
    pub fn is_circular(&self) -> bool {
        match self {
            DiError::CircularDependency { .. } => true,
            DiError::PluginContribution { cause, .. } => cause.is_circular(),
            _ => false,
        }
    }
}

fn display_keys(keys: &[Key]) -> String {
    keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

fn display_failures(failures: &[DisposalFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for registry operations
pub type DiResult<T> = Result<T, DiError>;
