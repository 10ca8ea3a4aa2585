// Ambient propagation of the current execution context
//
// This module makes "the context of the call currently executing" reachable
// from anywhere inside that call without threading it through every
// signature. The binding is task-local, not thread-local: a call's
// continuations may resume on different worker threads, and sibling tasks
// multiplexed onto the same thread must never observe each other's binding.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use super::context::ExecutionContext;

tokio::task_local! {
    static CURRENT_CALL: RefCell<Option<Arc<ExecutionContext>>>;
}

/// Ambient access to the execution context of the current call.
///
/// The engine binds a context with [`scope`](AmbientCallScope::scope) for the
/// full duration of one call; filters, the operation body, and nested
/// helpers read it back with [`current`](AmbientCallScope::current). The
/// binding is released structurally when the scoped future finishes, on
/// every exit path. Scopes nest: an inner call shadows the outer binding and
/// the outer one becomes visible again when the inner call returns.
pub struct AmbientCallScope;

impl AmbientCallScope {
    /// Run `future` with `context` bound as the current call.
    pub async fn scope<F>(context: Arc<ExecutionContext>, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_CALL.scope(RefCell::new(Some(context)), future).await
    }

    /// The context bound to the current logical call chain, or `None`
    /// outside any invocation.
    pub fn current() -> Option<Arc<ExecutionContext>> {
        CURRENT_CALL
            .try_with(|cell| cell.borrow().clone())
            .ok()
            .flatten()
    }

    /// Detach the current binding early. Idempotent, and a no-op outside any
    /// invocation.
    pub fn clear() {
        let _ = CURRENT_CALL.try_with(|cell| cell.borrow_mut().take());
    }
}
