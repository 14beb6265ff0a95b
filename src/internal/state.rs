//! Service state cells: per-binding lifecycle and cached outcome.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::binding::AnyArc;
use crate::error::{DiError, DiResult};
use crate::internal::circular;
use crate::key::Key;

static NEXT_CELL_ID: AtomicUsize = AtomicUsize::new(1);

enum CellState {
    NotCreated,
    Creating {
        owner: ThreadId,
        // set when the owner re-entered the cell; the creation then fails
        poisoned: Option<DiError>,
    },
    Created(AnyArc),
    Failed(DiError),
}

/// Lifecycle cell of a factory or decorator binding.
///
/// `NotCreated -> Creating -> Created | Failed`. The terminal states cache the
/// value or error for every later request. Mutual exclusion is per cell, so
/// racing requests for different keys never wait on each other.
pub(crate) struct ServiceStateCell {
    id: usize,
    state: Mutex<CellState>,
    ready: Condvar,
}

/// Outcome of asking a cell for its value.
pub(crate) enum Acquire<'a> {
    /// The cell already holds a terminal outcome, or the request was refused
    Ready(DiResult<AnyArc>),
    /// The caller won the race and must run the factory
    Create(CreationGuard<'a>),
}

impl ServiceStateCell {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(CellState::NotCreated),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Returns the cached outcome, blocks while another thread creates the
    /// value, or hands creation to the caller.
    pub(crate) fn acquire(&self, key: &Key) -> Acquire<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            let owner = match &*state {
                CellState::Created(value) => return Acquire::Ready(Ok(value.clone())),
                CellState::Failed(err) => return Acquire::Ready(Err(err.clone())),
                CellState::NotCreated => None,
                CellState::Creating { owner, .. } => Some(*owner),
            };
            match owner {
                None => {
                    *state = CellState::Creating { owner: me, poisoned: None };
                    return Acquire::Create(CreationGuard {
                        cell: self,
                        key: *key,
                        done: false,
                    });
                }
                Some(owner) if owner == me => {
                    let err = DiError::CircularDependency {
                        path: circular::reentrant_path(self.id, key),
                    };
                    tracing::warn!(service = %key, error = %err, "circular dependency detected");
                    if let CellState::Creating { poisoned, .. } = &mut *state {
                        *poisoned = Some(err.clone());
                    }
                    return Acquire::Ready(Err(err));
                }
                Some(owner) => {
                    if !circular::begin_wait(owner) {
                        let err = DiError::CircularDependency {
                            path: circular::current_path(key),
                        };
                        tracing::warn!(service = %key, error = %err, "circular wait between threads detected");
                        return Acquire::Ready(Err(err));
                    }
                    self.ready.wait(&mut state);
                    circular::end_wait();
                }
            }
        }
    }
}

/// Exclusive right to create a cell's value.
///
/// Dropping the guard without completing it (a panicking factory) fails the
/// cell and wakes every waiter.
pub(crate) struct CreationGuard<'a> {
    cell: &'a ServiceStateCell,
    key: Key,
    done: bool,
}

impl CreationGuard<'_> {
    /// Stores the factory outcome and wakes waiters.
    pub(crate) fn complete(mut self, result: DiResult<AnyArc>) -> DiResult<AnyArc> {
        let mut state = self.cell.state.lock();
        let poisoned = match &mut *state {
            CellState::Creating { poisoned, .. } => poisoned.take(),
            _ => None,
        };
        let result = match (result, poisoned) {
            (Ok(_), Some(err)) => Err(err),
            (result, _) => result,
        };
        *state = match &result {
            Ok(value) => CellState::Created(value.clone()),
            Err(err) => CellState::Failed(err.clone()),
        };
        self.done = true;
        drop(state);
        self.cell.ready.notify_all();
        result
    }
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.cell.state.lock() = CellState::Failed(DiError::FactoryPanicked { key: self.key });
            self.cell.ready.notify_all();
        }
    }
}
