//! Invocation pipeline for the Armature engine
//!
//! This module provides the invocation pipeline for Armature domain
//! services: the per-call execution context, the ambient scope that makes it
//! reachable from anywhere inside a call, the operation registry, the filter
//! chain, lifecycle events, and the engine that drives one call end to end.

pub mod context;
pub mod engine;
pub mod events;
pub mod filter;
pub mod propagation;
pub mod registry;
pub mod service;

// Re-export key types
pub use context::{CallContext, CallContextBuilder, ExecutionContext};
pub use engine::InvocationEngine;
pub use events::{AsyncEvent, SyncEvent};
pub use filter::ServiceFilter;
pub use propagation::AmbientCallScope;
pub use registry::{MethodDescriptor, MethodHandler, MethodRegistration, MethodRegistry, Operation};
pub use service::{DomainService, ServiceAccessor, ServiceBuilder};
