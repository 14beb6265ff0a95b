//! Capability keys for the service registry.

use std::any::TypeId;
use std::fmt;

/// Key identifying a capability that can be requested from a registry.
///
/// A key is a type, either a concrete type or a `dyn Trait` contract,
/// optionally qualified by a name. The stored type name is only used for
/// diagnostics: equality, ordering and hashing look at the `TypeId` and the
/// qualifier.
///
/// # Examples
///
/// ```rust
/// use service_registry::{ServiceRegistry, Resolver, Key};
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
/// registry.add_instance(42u32).unwrap();
/// registry.add_named_instance("config_port", 8080u32).unwrap();
/// registry.add_instance_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>).unwrap();
///
/// let number = registry.get_required::<u32>(); // Key::Type
/// let port = registry.get_named_required::<u32>("config_port"); // Key::TypeNamed
/// let logger = registry.get_required_trait::<dyn Logger>(); // Key::Trait
///
/// assert_eq!(*number, 42);
/// assert_eq!(*port, 8080);
/// logger.log("resolved");
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Named concrete type key with TypeId, type name, and qualifier
    TypeNamed(TypeId, &'static str, &'static str),
    /// Trait contract key (`dyn Trait`) with TypeId and trait name
    Trait(TypeId, &'static str),
    /// Named trait contract key with TypeId, trait name, and qualifier
    TraitNamed(TypeId, &'static str, &'static str),
}

impl Key {
    /// Key for the concrete type `T`.
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Key for the concrete type `T` qualified by `name`.
    #[inline]
    pub fn named<T: 'static>(name: &'static str) -> Self {
        Key::TypeNamed(TypeId::of::<T>(), std::any::type_name::<T>(), name)
    }

    /// Key for the trait contract `T` (usually `dyn SomeTrait`).
    #[inline]
    pub fn of_trait<T: ?Sized + 'static>() -> Self {
        Key::Trait(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Key for the trait contract `T` qualified by `name`.
    #[inline]
    pub fn named_trait<T: ?Sized + 'static>(name: &'static str) -> Self {
        Key::TraitNamed(TypeId::of::<T>(), std::any::type_name::<T>(), name)
    }

    /// Get the type or trait name for display
    ///
    /// ```rust
    /// use service_registry::Key;
    ///
    /// let key = Key::named::<u32>("port");
    /// assert_eq!(key.display_name(), "u32");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name)
            | Key::TypeNamed(_, name, _)
            | Key::Trait(_, name)
            | Key::TraitNamed(_, name, _) => name,
        }
    }

    /// Get the qualifier for named keys, or None for unnamed keys
    ///
    /// ```rust
    /// use service_registry::Key;
    ///
    /// assert_eq!(Key::of::<String>().service_name(), None);
    /// assert_eq!(Key::named::<u32>("database_port").service_name(), Some("database_port"));
    /// ```
    pub fn service_name(&self) -> Option<&'static str> {
        match self {
            Key::Type(_, _) | Key::Trait(_, _) => None,
            Key::TypeNamed(_, _, name) | Key::TraitNamed(_, _, name) => Some(name),
        }
    }

    /// The `TypeId` of the requested type or trait object.
    pub fn type_id(&self) -> TypeId {
        match self {
            Key::Type(id, _)
            | Key::TypeNamed(id, _, _)
            | Key::Trait(id, _)
            | Key::TraitNamed(id, _, _) => *id,
        }
    }

    /// Whether values for this key are stored as `Arc<Arc<dyn Trait>>`.
    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(_, _) | Key::TraitNamed(_, _, _))
    }

    fn discriminant(&self) -> u8 {
        match self {
            Key::Type(_, _) => 0,
            Key::TypeNamed(_, _, _) => 1,
            Key::Trait(_, _) => 2,
            Key::TraitNamed(_, _, _) => 3,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.service_name() {
            Some(name) => write!(f, "{}[\"{}\"]", self.display_name(), name),
            None => f.write_str(self.display_name()),
        }
    }
}

// TypeId comparison only, the type name is diagnostic
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.discriminant() == other.discriminant()
            && self.type_id() == other.type_id()
            && self.service_name() == other.service_name()
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.discriminant()
            .cmp(&other.discriminant())
            .then_with(|| self.type_id().cmp(&other.type_id()))
            .then_with(|| self.service_name().cmp(&other.service_name()))
    }
}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.discriminant().hash(state);
        self.type_id().hash(state);
        self.service_name().hash(state);
    }
}

/// Helper for creating concrete type keys.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::of::<T>()
}
