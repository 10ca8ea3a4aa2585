// Operation registry for domain services
//
// This module provides the static registry mapping each declared operation
// of a service to its strongly-typed handler and its declared method-level
// filters. The registry is populated at service-composition time and frozen
// afterward; the descriptor is an opaque key into it.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use armature_error::{EngineError, EngineResult};

use super::context::ExecutionContext;
use super::filter::ServiceFilter;

/// Immutable handle identifying one declared operation of a service.
///
/// Descriptors are cheap to clone and compare; the engine uses them as the
/// key of its method-filter cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    service: Arc<str>,
    name: Arc<str>,
}

impl MethodDescriptor {
    /// Create a descriptor for `name` on the service called `service`
    pub fn new(service: impl Into<String>, name: impl Into<String>) -> Self {
        MethodDescriptor {
            service: service.into().into(),
            name: name.into().into(),
        }
    }

    /// Name of the owning service
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Name of the operation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether either component is empty
    pub fn is_empty(&self) -> bool {
        self.service.is_empty() || self.name.is_empty()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.service, self.name)
    }
}

/// Boxed asynchronous operation body.
///
/// Handlers receive the shared [`ExecutionContext`] and produce a JSON value;
/// void operations return [`Value::Null`].
pub type MethodHandler =
    Arc<dyn Fn(Arc<ExecutionContext>) -> BoxFuture<'static, EngineResult<Value>> + Send + Sync>;

/// Declaration of a single operation: name, body, and method-level filters.
pub struct Operation {
    name: String,
    handler: MethodHandler,
    filters: Vec<Arc<dyn ServiceFilter>>,
    arity: Option<usize>,
}

impl Operation {
    /// Declare an operation with the given body
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<Value>> + Send + 'static,
    {
        Operation {
            name: name.into(),
            handler: Arc::new(
                move |context| -> BoxFuture<'static, EngineResult<Value>> {
                    Box::pin(handler(context))
                },
            ),
            filters: Vec::new(),
            arity: None,
        }
    }

    /// Declare a method-level filter. Declaration order is invocation order.
    pub fn with_filter(mut self, filter: Arc<dyn ServiceFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Declare the expected argument count, checked when the engine runs
    /// with strict arguments enabled
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("filters", &self.filters.len())
            .field("arity", &self.arity)
            .finish()
    }
}

/// One registered operation
pub struct MethodRegistration {
    descriptor: MethodDescriptor,
    handler: MethodHandler,
    filters: Vec<Arc<dyn ServiceFilter>>,
    arity: Option<usize>,
}

impl MethodRegistration {
    /// The descriptor this registration answers to
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// The operation body
    pub fn handler(&self) -> &MethodHandler {
        &self.handler
    }

    /// Invoke the operation body
    pub fn invoke(&self, context: Arc<ExecutionContext>) -> BoxFuture<'static, EngineResult<Value>> {
        (self.handler.as_ref())(context)
    }

    /// Declared method-level filters, declaration order
    pub fn filters(&self) -> &[Arc<dyn ServiceFilter>] {
        &self.filters
    }

    /// Declared argument count, if any
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }
}

impl fmt::Debug for MethodRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistration")
            .field("descriptor", &self.descriptor)
            .field("filters", &self.filters.len())
            .field("arity", &self.arity)
            .finish()
    }
}

/// Registry of the operations a service declares
pub struct MethodRegistry {
    methods: HashMap<MethodDescriptor, MethodRegistration>,
}

impl MethodRegistry {
    pub(crate) fn from_operations(
        service: &str,
        operations: Vec<Operation>,
    ) -> EngineResult<Self> {
        let mut methods = HashMap::new();
        for operation in operations {
            let descriptor = MethodDescriptor::new(service, operation.name.clone());
            if methods.contains_key(&descriptor) {
                return Err(EngineError::InvalidArgument(format!(
                    "Operation {} declared more than once",
                    descriptor
                )));
            }
            methods.insert(
                descriptor.clone(),
                MethodRegistration {
                    descriptor,
                    handler: operation.handler,
                    filters: operation.filters,
                    arity: operation.arity,
                },
            );
        }
        Ok(MethodRegistry { methods })
    }

    /// Whether the registry declares `descriptor`
    pub fn contains(&self, descriptor: &MethodDescriptor) -> bool {
        self.methods.contains_key(descriptor)
    }

    /// Look up a registration
    pub fn get(&self, descriptor: &MethodDescriptor) -> Option<&MethodRegistration> {
        self.methods.get(descriptor)
    }

    /// Filters declared on `descriptor`, declaration order; empty for an
    /// unknown descriptor
    pub fn declared_filters(&self, descriptor: &MethodDescriptor) -> Vec<Arc<dyn ServiceFilter>> {
        self.methods
            .get(descriptor)
            .map(|registration| registration.filters.clone())
            .unwrap_or_default()
    }

    /// All declared descriptors
    pub fn descriptors(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.keys()
    }

    /// Number of declared operations
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct NoopFilter;

    #[async_trait]
    impl ServiceFilter for NoopFilter {}

    fn noop(name: &str) -> Operation {
        Operation::new(name, |_context| async { Ok(Value::Null) })
    }

    #[test]
    fn descriptor_identity() {
        let a = MethodDescriptor::new("accounts", "deposit");
        let b = MethodDescriptor::new("accounts", "deposit");
        let c = MethodDescriptor::new("accounts", "withdraw");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "accounts::deposit");
        assert!(!a.is_empty());
        assert!(MethodDescriptor::new("", "deposit").is_empty());
    }

    #[test]
    fn registry_declares_operations() {
        let registry = MethodRegistry::from_operations(
            "accounts",
            vec![
                noop("deposit").with_filter(Arc::new(NoopFilter)).with_arity(2),
                noop("withdraw"),
            ],
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        let descriptor = MethodDescriptor::new("accounts", "deposit");
        assert!(registry.contains(&descriptor));
        assert_eq!(registry.declared_filters(&descriptor).len(), 1);
        assert_eq!(registry.get(&descriptor).unwrap().arity(), Some(2));

        let foreign = MethodDescriptor::new("billing", "deposit");
        assert!(!registry.contains(&foreign));
        assert!(registry.declared_filters(&foreign).is_empty());
    }

    #[test]
    fn duplicate_operations_are_rejected() {
        let result =
            MethodRegistry::from_operations("accounts", vec![noop("deposit"), noop("deposit")]);
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn handler_produces_a_value() {
        use crate::invocation::context::CallContext;
        use crate::invocation::service::DomainService;

        let registry = MethodRegistry::from_operations(
            "accounts",
            vec![Operation::new("balance", |_context| async { Ok(json!(100)) })],
        )
        .unwrap();

        let service = DomainService::builder("accounts").build().unwrap();
        let descriptor = MethodDescriptor::new("accounts", "balance");
        let call = CallContext::builder().build();
        let context = Arc::new(ExecutionContext::new(
            service,
            call,
            descriptor.clone(),
            Vec::new(),
        ));

        let registration = registry.get(&descriptor).unwrap();
        let value = registration.invoke(context).await.unwrap();
        assert_eq!(value, json!(100));
    }
}
