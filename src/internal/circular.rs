//! Circular dependency detection infrastructure.
//!
//! Two mechanisms cooperate here. A thread-local resolution stack records the
//! cells the current thread is creating, which yields the cycle path when a
//! thread re-enters one of its own cells. A process-wide wait-for graph
//! records which thread is blocked on a cell owned by which other thread, so a
//! wait that would close a loop between threads is reported instead of
//! deadlocking.

use std::cell::RefCell;
use std::collections::HashMap;
use std::thread::{self, ThreadId};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::key::Key;

thread_local! {
    static RESOLUTION_TLS: RefCell<ResolutionTls> = RefCell::new(ResolutionTls::default());
}

// waiting thread -> thread that owns the cell it waits on
static WAITS: Lazy<Mutex<HashMap<ThreadId, ThreadId>>> = Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Default)]
struct ResolutionTls {
    stack: Vec<(usize, Key)>,
    visiting: Vec<usize>,
}

/// Guard recording that the current thread is creating a cell.
///
/// A factory starts a fresh search, so the composition visit path of the
/// enclosing lookup is parked until the frame is dropped.
pub(crate) struct ResolutionFrame {
    cell_id: usize,
    parked_visits: Vec<usize>,
}

impl ResolutionFrame {
    pub(crate) fn push(cell_id: usize, key: Key) -> Self {
        let parked_visits = RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            tls.stack.push((cell_id, key));
            std::mem::take(&mut tls.visiting)
        });
        Self { cell_id, parked_visits }
    }
}

impl Drop for ResolutionFrame {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(pos) = tls.stack.iter().rposition(|(id, _)| *id == self.cell_id) {
                tls.stack.truncate(pos);
            }
            tls.visiting = std::mem::take(&mut self.parked_visits);
        });
    }
}

/// Cycle path for a re-entrant request of `cell_id` on this thread.
///
/// Starts at the frame that first entered the cell and ends with `key`.
pub(crate) fn reentrant_path(cell_id: usize, key: &Key) -> Vec<String> {
    RESOLUTION_TLS.with(|tls| {
        let tls = tls.borrow();
        let start = tls
            .stack
            .iter()
            .position(|(id, _)| *id == cell_id)
            .unwrap_or(tls.stack.len());
        let mut path: Vec<String> = tls.stack[start..].iter().map(|(_, k)| k.to_string()).collect();
        if path.is_empty() {
            path.push(key.to_string());
        }
        path.push(key.to_string());
        path
    })
}

/// Everything this thread is creating, followed by `key`.
pub(crate) fn current_path(key: &Key) -> Vec<String> {
    RESOLUTION_TLS.with(|tls| {
        let tls = tls.borrow();
        let mut path: Vec<String> = tls.stack.iter().map(|(_, k)| k.to_string()).collect();
        path.push(key.to_string());
        path
    })
}

/// Records that the current thread is about to wait on a cell owned by `owner`.
///
/// Returns `false`, recording nothing, when `owner` is (transitively) waiting
/// on the current thread.
pub(crate) fn begin_wait(owner: ThreadId) -> bool {
    let me = thread::current().id();
    let mut waits = WAITS.lock();
    let mut cursor = owner;
    for _ in 0..=waits.len() {
        if cursor == me {
            return false;
        }
        match waits.get(&cursor) {
            Some(next) => cursor = *next,
            None => break,
        }
    }
    waits.insert(me, owner);
    true
}

/// Clears the current thread's wait edge.
pub(crate) fn end_wait() {
    WAITS.lock().remove(&thread::current().id());
}

/// Guard marking a registry node as being searched by the current thread.
///
/// Breaks composition cycles: a node that is already on the search path
/// is treated as having nothing to offer.
pub(crate) struct VisitGuard {
    node_id: usize,
}

impl VisitGuard {
    pub(crate) fn enter(node_id: usize) -> Option<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if tls.visiting.contains(&node_id) {
                None
            } else {
                tls.visiting.push(node_id);
                Some(Self { node_id })
            }
        })
    }
}

impl Drop for VisitGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(pos) = tls.visiting.iter().rposition(|id| *id == self.node_id) {
                tls.visiting.remove(pos);
            }
        });
    }
}
