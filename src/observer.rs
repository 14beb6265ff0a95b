//! Diagnostic observers for registry events.
//!
//! Observers are attached per registry node and see the creation and release
//! of the services that node owns. Cache hits are not reported.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::Key;

/// Observer trait for registry lifecycle events.
///
/// Calls are made synchronously on the resolving thread, so keep
/// implementations lightweight.
///
/// # Examples
///
/// ```
/// use service_registry::{RegistryObserver, ServiceRegistry, Key, Resolver};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<String>>);
///
/// impl RegistryObserver for Recorder {
///     fn created(&self, _registry: &str, key: &Key, _elapsed: Duration) {
///         self.0.lock().unwrap().push(key.to_string());
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let registry = ServiceRegistry::new();
/// registry.add_observer(recorder.clone());
/// registry.add_factory::<String, _>(|_| Ok("value".to_string())).unwrap();
///
/// registry.get_required::<String>();
/// registry.get_required::<String>();
/// assert_eq!(recorder.0.lock().unwrap().len(), 1);
/// ```
pub trait RegistryObserver: Send + Sync {
    /// A factory or decorator is about to run for `key`.
    fn resolving(&self, _registry: &str, _key: &Key) {}

    /// The factory for `key` returned a value.
    fn created(&self, _registry: &str, _key: &Key, _elapsed: Duration) {}

    /// The factory for `key` failed; the error is now cached.
    fn creation_failed(&self, _registry: &str, _key: &Key, _error: &DiError) {}

    /// The release operation of `service` ran successfully during close.
    fn disposed(&self, _registry: &str, _service: &str) {}
}

/// Observer forwarding every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RegistryObserver for TracingObserver {
    fn resolving(&self, registry: &str, key: &Key) {
        tracing::trace!(registry, service = %key, "creating service");
    }

    fn created(&self, registry: &str, key: &Key, elapsed: Duration) {
        tracing::debug!(registry, service = %key, elapsed_us = elapsed.as_micros() as u64, "created service");
    }

    fn creation_failed(&self, registry: &str, key: &Key, error: &DiError) {
        tracing::warn!(registry, service = %key, %error, "service creation failed");
    }

    fn disposed(&self, registry: &str, service: &str) {
        tracing::debug!(registry, service, "released service");
    }
}

/// Ordered set of observers attached to one node.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn RegistryObserver>>,
}

impl Observers {
    pub(crate) fn push(&mut self, observer: Arc<dyn RegistryObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn resolving(&self, registry: &str, key: &Key) {
        for o in &self.observers {
            o.resolving(registry, key);
        }
    }

    pub(crate) fn created(&self, registry: &str, key: &Key, elapsed: Duration) {
        for o in &self.observers {
            o.created(registry, key, elapsed);
        }
    }

    pub(crate) fn creation_failed(&self, registry: &str, key: &Key, error: &DiError) {
        for o in &self.observers {
            o.creation_failed(registry, key, error);
        }
    }

    pub(crate) fn disposed(&self, registry: &str, service: &str) {
        for o in &self.observers {
            o.disposed(registry, service);
        }
    }
}
