// Armature error handling
// Central location for the error types shared across the invocation pipeline.

use std::fmt;
use thiserror::Error;

// Re-export common error handling tools for convenience
pub use anyhow;
pub use thiserror;

/// Stable error codes for the engine
pub mod codes {
    use crate::ErrorCode;

    // Engine error codes start with 1000
    pub const INVALID_ARGUMENT: ErrorCode = ErrorCode(1001);
    pub const METHOD_NOT_OWNED: ErrorCode = ErrorCode(1002);
    pub const HANDLER_NOT_FOUND: ErrorCode = ErrorCode(1003);
    pub const EXECUTION_FAILED: ErrorCode = ErrorCode(1004);
    pub const EVENT_ERROR: ErrorCode = ErrorCode(1005);
    pub const CONTEXT_ERROR: ErrorCode = ErrorCode(1006);
    pub const SYNC_ERROR: ErrorCode = ErrorCode(1007);
    pub const SERIALIZATION_ERROR: ErrorCode = ErrorCode(1008);
    pub const NOT_FOUND: ErrorCode = ErrorCode(1009);
}

/// Error code structure for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u32);

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Errors raised by the invocation engine and routed through its
/// exception-interception stage.
///
/// The enum is `Clone` so an intercepted failure can be handed to
/// on-exception filters by reference and still be re-raised to the caller as
/// the original value.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Descriptor does not belong to the executing service
    #[error("Method not owned by service: {0}")]
    MethodNotOwned(String),

    /// Handler not found
    #[error("Handler not found: {0}")]
    HandlerNotFound(String),

    /// Execution failure
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Notification subscriber failure
    #[error("Event subscriber failed: {0}")]
    EventError(String),

    /// Execution context error
    #[error("Context error: {0}")]
    ContextError(String),

    /// Sync error
    #[error("Sync error: {0}")]
    SyncError(String),

    /// Serialization failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other errors (general purpose)
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        use codes::*;
        match self {
            EngineError::InvalidArgument(_) => INVALID_ARGUMENT,
            EngineError::MethodNotOwned(_) => METHOD_NOT_OWNED,
            EngineError::HandlerNotFound(_) => HANDLER_NOT_FOUND,
            EngineError::ExecutionFailed(_) => EXECUTION_FAILED,
            EngineError::EventError(_) => EVENT_ERROR,
            EngineError::ContextError(_) => CONTEXT_ERROR,
            EngineError::SyncError(_) => SYNC_ERROR,
            EngineError::SerializationFailed(_) => SERIALIZATION_ERROR,
            EngineError::DeserializationFailed(_) => SERIALIZATION_ERROR,
            EngineError::NotFound(_) => NOT_FOUND,
            EngineError::Other(_) => EXECUTION_FAILED,
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument(message.into())
    }

    /// Create a new handler not found error
    pub fn handler_not_found(method: impl Into<String>) -> Self {
        EngineError::HandlerNotFound(method.into())
    }

    /// Create a new execution failed error
    pub fn execution_failed(message: impl Into<String>) -> Self {
        EngineError::ExecutionFailed(message.into())
    }
}

/// Convenient Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(EngineError::invalid_argument("x").code(), codes::INVALID_ARGUMENT);
        assert_eq!(EngineError::handler_not_found("x").code(), codes::HANDLER_NOT_FOUND);
        assert_eq!(
            EngineError::DeserializationFailed("x".to_string()).code(),
            codes::SERIALIZATION_ERROR
        );
        assert_eq!(codes::SYNC_ERROR.to_string(), "1007");
    }

    #[test]
    fn cloned_error_keeps_payload() {
        let original = EngineError::execution_failed("account frozen");
        let shown = original.clone();
        assert_eq!(shown.to_string(), original.to_string());
        match shown {
            EngineError::ExecutionFailed(message) => assert_eq!(message, "account frozen"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
