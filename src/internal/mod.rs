//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;
pub(crate) mod state;

pub(crate) use circular::{ResolutionFrame, VisitGuard};
pub(crate) use dispose_bag::DisposeBag;
pub(crate) use state::{Acquire, ServiceStateCell};
