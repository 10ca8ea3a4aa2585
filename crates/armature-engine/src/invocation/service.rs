// Domain service composition
//
// A DomainService is assembled once at composition time: its name, its
// service-level filters, the operations it declares, and the lifecycle
// events external observers subscribe to. The engine drives calls against
// the composed service; the service itself holds no per-call state.

use std::fmt;
use std::sync::{Arc, RwLock};

use armature_error::{EngineError, EngineResult};

use super::context::ExecutionContext;
use super::events::AsyncEvent;
use super::filter::ServiceFilter;
use super::registry::{MethodDescriptor, MethodRegistry, Operation};

/// A composed domain service: declared operations, service-level filters,
/// and lifecycle notification events.
pub struct DomainService {
    name: String,
    filters: RwLock<Vec<Arc<dyn ServiceFilter>>>,
    registry: MethodRegistry,
    executing: AsyncEvent<Arc<ExecutionContext>>,
    executed: AsyncEvent<Arc<ExecutionContext>>,
}

impl DomainService {
    /// Start composing a service
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder {
            name: name.into(),
            filters: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Name of the service
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The operations this service declares
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Descriptor for one of this service's operations
    pub fn descriptor(&self, method: &str) -> MethodDescriptor {
        MethodDescriptor::new(self.name.clone(), method)
    }

    /// Whether `descriptor` names a declared operation of this service
    pub fn owns(&self, descriptor: &MethodDescriptor) -> bool {
        descriptor.service() == self.name && self.registry.contains(descriptor)
    }

    /// Snapshot of the service-level filters, declaration order
    pub fn filters(&self) -> EngineResult<Vec<Arc<dyn ServiceFilter>>> {
        let filters = self.filters.read().map_err(|_| {
            EngineError::SyncError("Failed to acquire read lock on service filters".to_string())
        })?;
        Ok(filters.clone())
    }

    /// Append a service-level filter
    pub fn add_filter(&self, filter: Arc<dyn ServiceFilter>) -> EngineResult<()> {
        let mut filters = self.filters.write().map_err(|_| {
            EngineError::SyncError("Failed to acquire write lock on service filters".to_string())
        })?;
        filters.push(filter);
        Ok(())
    }

    /// Pre-invoke notification, raised before the operation body runs
    pub fn executing(&self) -> &AsyncEvent<Arc<ExecutionContext>> {
        &self.executing
    }

    /// Post-invoke notification, raised after the operation body returns
    pub fn executed(&self) -> &AsyncEvent<Arc<ExecutionContext>> {
        &self.executed
    }
}

impl fmt::Debug for DomainService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainService")
            .field("name", &self.name)
            .field("methods", &self.registry.len())
            .finish()
    }
}

/// Builder for [`DomainService`]
pub struct ServiceBuilder {
    name: String,
    filters: Vec<Arc<dyn ServiceFilter>>,
    operations: Vec<Operation>,
}

impl ServiceBuilder {
    /// Add a service-level filter. Declaration order is invocation order.
    pub fn with_filter(mut self, filter: Arc<dyn ServiceFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Declare an operation
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Finish composition
    pub fn build(self) -> EngineResult<Arc<DomainService>> {
        let registry = MethodRegistry::from_operations(&self.name, self.operations)?;
        Ok(Arc::new(DomainService {
            name: self.name,
            filters: RwLock::new(self.filters),
            registry,
            executing: AsyncEvent::new(),
            executed: AsyncEvent::new(),
        }))
    }
}

/// Call-scoped slot holding the service currently handling a call.
///
/// The engine fills the slot at entry and empties it on every exit path, so
/// code resolved from the call context can find the service mid-call and
/// never observes a stale one afterward.
pub struct ServiceAccessor {
    current: RwLock<Option<Arc<DomainService>>>,
}

impl ServiceAccessor {
    /// Create an empty accessor
    pub fn new() -> Self {
        ServiceAccessor {
            current: RwLock::new(None),
        }
    }

    /// The service currently handling the call, if any
    pub fn current(&self) -> EngineResult<Option<Arc<DomainService>>> {
        let current = self.current.read().map_err(|_| {
            EngineError::SyncError("Failed to acquire read lock on service accessor".to_string())
        })?;
        Ok(current.clone())
    }

    /// Mark `service` as handling the current call
    pub fn set(&self, service: Arc<DomainService>) -> EngineResult<()> {
        let mut current = self.current.write().map_err(|_| {
            EngineError::SyncError("Failed to acquire write lock on service accessor".to_string())
        })?;
        *current = Some(service);
        Ok(())
    }

    /// Empty the slot. Idempotent.
    pub fn clear(&self) -> EngineResult<()> {
        let mut current = self.current.write().map_err(|_| {
            EngineError::SyncError("Failed to acquire write lock on service accessor".to_string())
        })?;
        *current = None;
        Ok(())
    }
}

impl Default for ServiceAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupied = self
            .current
            .read()
            .map(|current| current.is_some())
            .unwrap_or(false);
        f.debug_struct("ServiceAccessor")
            .field("occupied", &occupied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NoopFilter;

    #[async_trait]
    impl ServiceFilter for NoopFilter {}

    #[test]
    fn builder_composes_a_service() {
        let service = DomainService::builder("accounts")
            .with_filter(Arc::new(NoopFilter))
            .operation(Operation::new("deposit", |_context| async {
                Ok(Value::Null)
            }))
            .operation(Operation::new("withdraw", |_context| async {
                Ok(Value::Null)
            }))
            .build()
            .unwrap();

        assert_eq!(service.name(), "accounts");
        assert_eq!(service.registry().len(), 2);
        assert_eq!(service.filters().unwrap().len(), 1);

        service.add_filter(Arc::new(NoopFilter)).unwrap();
        assert_eq!(service.filters().unwrap().len(), 2);
    }

    #[test]
    fn ownership_requires_name_and_declaration() {
        let service = DomainService::builder("accounts")
            .operation(Operation::new("deposit", |_context| async {
                Ok(Value::Null)
            }))
            .build()
            .unwrap();

        assert!(service.owns(&service.descriptor("deposit")));
        assert!(!service.owns(&service.descriptor("transfer")));
        assert!(!service.owns(&MethodDescriptor::new("billing", "deposit")));
    }

    #[test]
    fn accessor_set_and_clear() {
        let service = DomainService::builder("accounts").build().unwrap();
        let accessor = ServiceAccessor::new();

        assert!(accessor.current().unwrap().is_none());
        accessor.set(service.clone()).unwrap();
        assert!(Arc::ptr_eq(
            &accessor.current().unwrap().unwrap(),
            &service
        ));

        accessor.clear().unwrap();
        assert!(accessor.current().unwrap().is_none());
        // clearing an empty slot stays empty
        accessor.clear().unwrap();
        assert!(accessor.current().unwrap().is_none());
    }
}
