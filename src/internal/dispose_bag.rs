//! Internal disposal bag for managing release hooks.

use crate::error::{BoxError, DisposalFailure};

type DisposeHook = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// Container for release hooks with LIFO execution order.
///
/// Hooks are pushed in creation order, so running them in reverse releases a
/// dependent before the services it was built from.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<(String, DisposeHook)>,
}

impl DisposeBag {
    /// Add a release hook for the named service.
    pub(crate) fn push(&mut self, service: String, hook: DisposeHook) {
        self.hooks.push((service, hook));
    }

    /// Take every hook out of the bag, leaving it empty.
    pub(crate) fn take(&mut self) -> DisposeBag {
        std::mem::take(self)
    }

    /// Execute all hooks in reverse order (LIFO), collecting failures.
    ///
    /// A failing hook never stops the remaining ones from running.
    pub(crate) fn run_all_reverse(mut self, mut on_disposed: impl FnMut(&str)) -> Vec<DisposalFailure> {
        let mut failures = Vec::new();
        while let Some((service, hook)) = self.hooks.pop() {
            match (hook)() {
                Ok(()) => on_disposed(&service),
                Err(err) => {
                    tracing::warn!(service = %service, error = %err, "failed to release service");
                    failures.push(DisposalFailure {
                        service,
                        message: err.to_string(),
                    });
                }
            }
        }
        failures
    }
}
