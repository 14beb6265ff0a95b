//! Configuration for registries and the service locator.
//!
//! Both types have sensible defaults. With the `config` feature enabled they
//! can also be loaded from JSON, which is how a host process usually ships
//! them alongside its plugin directories.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "config")]
use crate::{DiError, DiResult};

/// Options applied to a single registry node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RegistryConfig {
    /// Display name used in errors and log events; generated when absent
    pub name: Option<String>,
    /// Install a [`TracingObserver`](crate::TracingObserver) on construction
    pub trace_resolution: bool,
}

impl RegistryConfig {
    /// Config with the given registry name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Enables the built-in tracing observer.
    pub fn with_tracing(mut self) -> Self {
        self.trace_resolution = true;
        self
    }

    /// Parses a config from JSON.
    ///
    /// ```
    /// use service_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::from_json(r#"{ "name": "global", "trace_resolution": true }"#).unwrap();
    /// assert_eq!(config.name.as_deref(), Some("global"));
    /// assert!(config.trace_resolution);
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::Config {
            target: "RegistryConfig",
            message: e.to_string(),
        })
    }
}

/// Provider-configuration conventions used by the service locator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct LocatorConfig {
    /// Prefix joined with a contract's name to form its resource path
    pub resource_prefix: String,
    /// Start of a comment in a provider-configuration line
    pub comment_marker: char,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            resource_prefix: "META-INF/services/".to_string(),
            comment_marker: '#',
        }
    }
}

impl LocatorConfig {
    /// Resource path listing the implementations of `contract`.
    ///
    /// ```
    /// use service_registry::LocatorConfig;
    ///
    /// let config = LocatorConfig::default();
    /// assert_eq!(config.resource_name("org.example.Plugin"), "META-INF/services/org.example.Plugin");
    /// ```
    pub fn resource_name(&self, contract: &str) -> String {
        format!("{}{}", self.resource_prefix, contract)
    }

    /// Parses a config from JSON.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::Config {
            target: "LocatorConfig",
            message: e.to_string(),
        })
    }
}
