// Configuration for the Armature invocation engine
//
// This module provides configuration options for the invocation engine.

/// Configuration for the invocation engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether to emit tracing events for each invocation
    pub trace_invocations: bool,

    /// Whether to reject calls whose bound argument count differs from the
    /// arity declared on the operation registration
    pub strict_arguments: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trace_invocations: true,
            strict_arguments: false,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable invocation tracing
    pub fn with_trace_invocations(mut self, enable: bool) -> Self {
        self.trace_invocations = enable;
        self
    }

    /// Enable or disable strict argument arity checking
    pub fn with_strict_arguments(mut self, enable: bool) -> Self {
        self.strict_arguments = enable;
        self
    }
}
