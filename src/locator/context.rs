//! Search contexts: where the locator finds provider configurations and
//! implementations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{DiError, DiResult};

use super::Implementation;

/// A provider-configuration resource found in a search context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Where the resource was found, for diagnostics
    pub origin: String,
    /// Raw resource bytes, expected to be UTF-8
    pub content: Vec<u8>,
}

/// Abstraction over "places implementations can be found".
///
/// A context enumerates the resources with a given name visible in its lookup
/// scope, in discovery order, and loads implementations by fully-qualified
/// name.
pub trait SearchContext: Send + Sync {
    /// Name used in diagnostics and contribution records.
    fn name(&self) -> &str;

    /// Every resource named `resource_name`, in discovery order.
    fn resources(&self, resource_name: &str) -> DiResult<Vec<Resource>>;

    /// Loads the implementation with the given fully-qualified name.
    fn load(&self, implementation: &str) -> Option<Arc<Implementation>>;
}

/// Implementations loadable by name.
#[derive(Default, Clone)]
pub struct ImplementationTable {
    implementations: HashMap<String, Arc<Implementation>>,
}

impl ImplementationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an implementation, replacing one with the same name.
    pub fn insert(&mut self, implementation: Implementation) {
        self.implementations
            .insert(implementation.name().to_string(), Arc::new(implementation));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Implementation>> {
        self.implementations.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}

/// In-memory search context: a static plugin list.
///
/// Used in tests and in environments where scanning is not available.
///
/// ```
/// use service_registry::StaticSearchContext;
///
/// let context = StaticSearchContext::new("test")
///     .with_resource("META-INF/services/org.example.Plugin", "org.example.First\n");
/// ```
#[derive(Default, Clone)]
pub struct StaticSearchContext {
    name: String,
    resources: Vec<(String, Resource)>,
    implementations: ImplementationTable,
}

impl StaticSearchContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a resource; several resources may share a name.
    pub fn with_resource(mut self, resource_name: impl Into<String>, content: impl Into<String>) -> Self {
        let resource_name = resource_name.into();
        let origin = format!("{}!/{}#{}", self.name, resource_name, self.resources.len());
        self.resources.push((
            resource_name,
            Resource {
                origin,
                content: content.into().into_bytes(),
            },
        ));
        self
    }

    /// Adds a resource with raw bytes.
    pub fn with_raw_resource(mut self, resource_name: impl Into<String>, content: Vec<u8>) -> Self {
        let resource_name = resource_name.into();
        let origin = format!("{}!/{}#{}", self.name, resource_name, self.resources.len());
        self.resources.push((resource_name, Resource { origin, content }));
        self
    }

    pub fn with_implementation(mut self, implementation: Implementation) -> Self {
        self.implementations.insert(implementation);
        self
    }
}

impl SearchContext for StaticSearchContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn resources(&self, resource_name: &str) -> DiResult<Vec<Resource>> {
        Ok(self
            .resources
            .iter()
            .filter(|(name, _)| name == resource_name)
            .map(|(_, resource)| resource.clone())
            .collect())
    }

    fn load(&self, implementation: &str) -> Option<Arc<Implementation>> {
        self.implementations.get(implementation)
    }
}

/// Search context backed by an ordered list of directories.
///
/// Each root contributes `<root>/<resource_name>` when that file exists;
/// roots are searched in the order they were added. Implementations come
/// from a table linked into the host binary.
#[derive(Clone)]
pub struct DirectorySearchContext {
    name: String,
    roots: Vec<PathBuf>,
    implementations: ImplementationTable,
}

impl DirectorySearchContext {
    pub fn new(name: impl Into<String>, implementations: ImplementationTable) -> Self {
        Self {
            name: name.into(),
            roots: Vec::new(),
            implementations,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl SearchContext for DirectorySearchContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn resources(&self, resource_name: &str) -> DiResult<Vec<Resource>> {
        let mut found = Vec::new();
        for root in &self.roots {
            let path = root.join(resource_name);
            if !path.is_file() {
                continue;
            }
            let content = std::fs::read(&path).map_err(|e| DiError::Io {
                resource: path.display().to_string(),
                message: e.to_string(),
            })?;
            tracing::trace!(context = %self.name, path = %path.display(), "found provider configuration");
            found.push(Resource {
                origin: path.display().to_string(),
                content,
            });
        }
        Ok(found)
    }

    fn load(&self, implementation: &str) -> Option<Arc<Implementation>> {
        self.implementations.get(implementation)
    }
}
