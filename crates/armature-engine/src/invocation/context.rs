// Call and execution contexts for the invocation pipeline

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;

use armature_error::{EngineError, EngineResult};

use super::filter::ServiceFilter;
use super::registry::MethodDescriptor;
use super::service::{DomainService, ServiceAccessor};

/// Caller-supplied context for one call.
///
/// A `CallContext` carries everything the surrounding framework resolved
/// before asking the engine to execute: dependencies looked up by type, the
/// pre-bound argument values for the target operation, request data for
/// out-of-core binding collaborators, and filters that apply to this one
/// invocation only.
pub struct CallContext {
    /// Resolved dependencies, looked up by type
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Filters attached to this call only, declaration order
    filters: Vec<Arc<dyn ServiceFilter>>,
    /// Pre-bound argument values for the target operation
    arguments: Vec<Value>,
    /// Request data for binding collaborators
    data: HashMap<String, Value>,
}

impl CallContext {
    /// Start building a call context.
    ///
    /// A fresh [`ServiceAccessor`] is registered by default so the engine can
    /// mark the service handling the call; registering another accessor
    /// replaces it.
    pub fn builder() -> CallContextBuilder {
        CallContextBuilder::new().with_service(Arc::new(ServiceAccessor::new()))
    }

    /// Resolve a dependency by type
    pub fn service<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|service| service.clone().downcast::<T>().ok())
    }

    /// Resolve a dependency by type, failing if it was not registered
    pub fn require_service<T: Send + Sync + 'static>(&self) -> EngineResult<Arc<T>> {
        self.service::<T>().ok_or_else(|| {
            EngineError::NotFound(format!(
                "No service of type {} in call context",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Filters attached to this call, declaration order
    pub fn filters(&self) -> &[Arc<dyn ServiceFilter>] {
        &self.filters
    }

    /// Pre-bound argument values
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Get a request-data entry
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("services", &self.services.len())
            .field("filters", &self.filters.len())
            .field("arguments", &self.arguments.len())
            .field("data", &self.data.len())
            .finish()
    }
}

/// Builder for [`CallContext`]
pub struct CallContextBuilder {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    filters: Vec<Arc<dyn ServiceFilter>>,
    arguments: Vec<Value>,
    data: HashMap<String, Value>,
}

impl CallContextBuilder {
    fn new() -> Self {
        CallContextBuilder {
            services: HashMap::new(),
            filters: Vec::new(),
            arguments: Vec::new(),
            data: HashMap::new(),
        }
    }

    /// Register a dependency, replacing any previous registration of the
    /// same type
    pub fn with_service<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.services.insert(TypeId::of::<T>(), service);
        self
    }

    /// Attach a filter to this call
    pub fn with_filter(mut self, filter: Arc<dyn ServiceFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the pre-bound argument values
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Add a request-data entry
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Finish building
    pub fn build(self) -> Arc<CallContext> {
        Arc::new(CallContext {
            services: self.services,
            filters: self.filters,
            arguments: self.arguments,
            data: self.data,
        })
    }
}

/// The mutable record of one in-flight call.
///
/// Exactly one `ExecutionContext` exists per call; it is created when the
/// engine starts the call and discarded when the call returns. Filters and
/// the operation body share it through the ambient scope, so the result slot
/// and the completed flag use interior mutability.
pub struct ExecutionContext {
    /// The service handling this call
    service: Arc<DomainService>,
    /// The caller-supplied context
    call: Arc<CallContext>,
    /// The operation being executed
    descriptor: MethodDescriptor,
    /// Argument values, mutable until the operation body runs
    arguments: RwLock<Vec<Value>>,
    /// The produced result, empty until set
    result: RwLock<Option<Value>>,
    /// Short-circuit flag
    completed: AtomicBool,
    /// When the engine started this call
    started_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Create the record for one call
    pub fn new(
        service: Arc<DomainService>,
        call: Arc<CallContext>,
        descriptor: MethodDescriptor,
        arguments: Vec<Value>,
    ) -> Self {
        ExecutionContext {
            service,
            call,
            descriptor,
            arguments: RwLock::new(arguments),
            result: RwLock::new(None),
            completed: AtomicBool::new(false),
            started_at: Utc::now(),
        }
    }

    /// The service handling this call
    pub fn service(&self) -> &Arc<DomainService> {
        &self.service
    }

    /// The caller-supplied context
    pub fn call_context(&self) -> &Arc<CallContext> {
        &self.call
    }

    /// The operation being executed
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// When the engine started this call
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Snapshot of the argument values
    pub fn arguments(&self) -> EngineResult<Vec<Value>> {
        let arguments = self.arguments.read().map_err(|_| {
            EngineError::SyncError("Failed to acquire read lock on arguments".to_string())
        })?;
        Ok(arguments.clone())
    }

    /// Get one argument value by position
    pub fn argument(&self, index: usize) -> EngineResult<Value> {
        let arguments = self.arguments.read().map_err(|_| {
            EngineError::SyncError("Failed to acquire read lock on arguments".to_string())
        })?;
        arguments.get(index).cloned().ok_or_else(|| {
            EngineError::ContextError(format!(
                "Argument {} out of range for {}",
                index, self.descriptor
            ))
        })
    }

    /// Replace the argument values. Only meaningful before the operation
    /// body runs; before-invoke filters use this to finish binding.
    pub fn set_arguments(&self, values: Vec<Value>) -> EngineResult<()> {
        let mut arguments = self.arguments.write().map_err(|_| {
            EngineError::SyncError("Failed to acquire write lock on arguments".to_string())
        })?;
        *arguments = values;
        Ok(())
    }

    /// The produced result, if any
    pub fn result(&self) -> EngineResult<Option<Value>> {
        let result = self.result.read().map_err(|_| {
            EngineError::SyncError("Failed to acquire read lock on result".to_string())
        })?;
        Ok(result.clone())
    }

    /// Set the result slot.
    ///
    /// Independent of [`mark_completed`](Self::mark_completed): a filter may
    /// rewrite the result and let the chain continue, or pair the two to
    /// short-circuit with a value.
    pub fn set_result(&self, value: Value) -> EngineResult<()> {
        let mut result = self.result.write().map_err(|_| {
            EngineError::SyncError("Failed to acquire write lock on result".to_string())
        })?;
        *result = Some(value);
        Ok(())
    }

    /// Mark the call completed. Idempotent; every later pipeline stage is
    /// skipped once set.
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    /// Whether the call was marked completed
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("descriptor", &self.descriptor)
            .field("completed", &self.is_completed())
            .field("started_at", &self.started_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::service::DomainService;
    use serde_json::json;

    struct Ledger {
        name: &'static str,
    }

    fn test_context(arguments: Vec<Value>) -> ExecutionContext {
        let service = DomainService::builder("accounts").build().unwrap();
        let call = CallContext::builder().with_arguments(arguments.clone()).build();
        let descriptor = service.descriptor("deposit");
        ExecutionContext::new(service, call, descriptor, arguments)
    }

    #[test]
    fn resolves_dependencies_by_type() {
        let call = CallContext::builder()
            .with_service(Arc::new(Ledger { name: "main" }))
            .build();

        let ledger = call.require_service::<Ledger>().unwrap();
        assert_eq!(ledger.name, "main");
        assert!(call.service::<String>().is_none());
        assert!(matches!(
            call.require_service::<String>(),
            Err(EngineError::NotFound(_))
        ));
        // registered by CallContext::builder()
        assert!(call.service::<ServiceAccessor>().is_some());
    }

    #[test]
    fn carries_arguments_and_data() {
        let call = CallContext::builder()
            .with_arguments(vec![json!(10), json!("eur")])
            .with_data("request_id", json!("r-1"))
            .build();

        assert_eq!(call.arguments().len(), 2);
        assert_eq!(call.data("request_id"), Some(&json!("r-1")));
        assert_eq!(call.data("missing"), None);
    }

    #[test]
    fn result_slot_is_independent_of_completion() {
        let context = test_context(vec![json!(5)]);

        assert_eq!(context.result().unwrap(), None);
        context.set_result(json!(42)).unwrap();
        assert_eq!(context.result().unwrap(), Some(json!(42)));
        assert!(!context.is_completed());
    }

    #[test]
    fn mark_completed_is_idempotent() {
        let context = test_context(vec![]);
        context.set_result(json!("kept")).unwrap();

        context.mark_completed();
        assert!(context.is_completed());
        context.mark_completed();
        assert!(context.is_completed());
        assert_eq!(context.result().unwrap(), Some(json!("kept")));
    }

    #[test]
    fn arguments_are_mutable_before_invocation() {
        let context = test_context(vec![json!(1)]);

        assert_eq!(context.argument(0).unwrap(), json!(1));
        context.set_arguments(vec![json!(1), json!(2)]).unwrap();
        assert_eq!(context.arguments().unwrap().len(), 2);
        assert!(matches!(
            context.argument(7),
            Err(EngineError::ContextError(_))
        ));
    }
}
