// Cross-cutting filters around operation execution
//
// Filters come from three places, kept as three disjoint ordered lists:
// the service (every operation of that service), the operation declaration
// (one method), and the call context (one invocation). The engine runs the
// lists service -> method -> call before the body and call -> method ->
// service after it, so a service-level filter wraps everything else.

use async_trait::async_trait;

use armature_error::{EngineError, EngineResult};

use super::context::ExecutionContext;

/// Interceptor invoked around the execution of an operation.
///
/// All three extension points default to no-ops; a filter implements the
/// ones it cares about. A filter short-circuits the call by marking the
/// context completed, optionally setting a result first.
#[async_trait]
pub trait ServiceFilter: Send + Sync {
    /// Runs before the operation body
    async fn before_invoke(&self, _context: &ExecutionContext) -> EngineResult<()> {
        Ok(())
    }

    /// Runs after the operation body, unless the call was completed early
    async fn after_invoke(&self, _context: &ExecutionContext) -> EngineResult<()> {
        Ok(())
    }

    /// Runs when any pipeline stage failed, with the original failure.
    /// Marking the context completed here declares the failure handled.
    async fn on_exception(
        &self,
        _context: &ExecutionContext,
        _error: &EngineError,
    ) -> EngineResult<()> {
        Ok(())
    }
}
