//! Crate-wide error type and result alias.

use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TramaError>;

/// Errors produced by the planner, evaluator, and CRUD pipeline.
///
/// Structural errors (`UnknownEntity`, `AssociationCycle`, `UnknownBackend`,
/// `UnknownHook`) are reported before any backend call is made. Iterator
/// misuse (`UnboundIterator`, `ForeignPlan`) is a programming fault and fails
/// fast. `Interceptor`, `Hook`, and `Controller` carry runtime failures
/// propagated from user-supplied extensions.
#[derive(Debug, Error)]
pub enum TramaError {
    /// An association references an entity the metadata provider does not know.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    /// The association metadata loops back onto an entity already on the
    /// current descent path.
    #[error("association cycle through entity: {0}")]
    AssociationCycle(String),
    /// No CRUD controller is registered for the named backend.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),
    /// An entity hook binding names a hook the resolver cannot supply.
    #[error("unknown hook: {0}")]
    UnknownHook(String),
    /// A plan iterator was advanced before `reset` bound it to a plan.
    #[error("plan iterator is not bound to a plan")]
    UnboundIterator,
    /// A plan iterator was advanced with a plan other than the one it was
    /// bound to.
    #[error("plan iterator is bound to a different plan")]
    ForeignPlan,
    /// An interceptor was registered at a point requiring a capability the
    /// interceptor does not have.
    #[error("interceptor lacks the {required} capability required by {point}")]
    IncompatibleInterceptor {
        /// The offending intercept point.
        point: String,
        /// The capability that point requires.
        required: &'static str,
    },
    /// A malformed argument (unparsable path, flip on non-adjacent nodes,
    /// orientation length mismatch).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Failure raised by a registered interceptor.
    #[error("interceptor failed: {0}")]
    Interceptor(String),
    /// Failure raised by a hook implementation.
    #[error("hook failed: {0}")]
    Hook(String),
    /// Failure raised by a backend controller.
    #[error("controller failed: {0}")]
    Controller(String),
}

pub(crate) fn acquire_lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| {
        error!("registry lock poisoned - fatal error");
        TramaError::Controller("registry lock poisoned".into())
    })
}
