// Core engine functionality for Armature domain services

// Re-export modules
pub mod config;
pub mod invocation;

// Re-export key types
pub use config::EngineConfig;
pub use invocation::context::{CallContext, CallContextBuilder, ExecutionContext};
pub use invocation::engine::InvocationEngine;
pub use invocation::events::{AsyncEvent, SyncEvent};
pub use invocation::filter::ServiceFilter;
pub use invocation::propagation::AmbientCallScope;
pub use invocation::registry::{MethodDescriptor, MethodHandler, MethodRegistry, Operation};
pub use invocation::service::{DomainService, ServiceAccessor, ServiceBuilder};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
