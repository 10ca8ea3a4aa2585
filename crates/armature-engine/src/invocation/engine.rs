// Invocation engine
//
// Drives one call end to end: validation, filter-chain traversal, the
// lifecycle notifications, the operation body, and exception interception.
// Stage order within a call is fixed even though every stage is
// asynchronous; concurrent calls share nothing but the method-filter cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use armature_error::{EngineError, EngineResult};

use crate::config::EngineConfig;
use super::context::{CallContext, ExecutionContext};
use super::filter::ServiceFilter;
use super::propagation::AmbientCallScope;
use super::registry::{MethodDescriptor, MethodRegistration};
use super::service::{DomainService, ServiceAccessor};

/// Drives calls against one composed [`DomainService`].
///
/// The engine owns the method-filter cache, the only shared mutable state on
/// the hot path: the filter list a descriptor declares is resolved on first
/// use and reused for every later call of that operation.
pub struct InvocationEngine {
    service: Arc<DomainService>,
    config: EngineConfig,
    filter_cache: RwLock<HashMap<MethodDescriptor, Arc<Vec<Arc<dyn ServiceFilter>>>>>,
}

impl InvocationEngine {
    /// Create an engine with the default configuration
    pub fn new(service: Arc<DomainService>) -> Self {
        Self::with_config(service, EngineConfig::default())
    }

    /// Create an engine with a custom configuration
    pub fn with_config(service: Arc<DomainService>, config: EngineConfig) -> Self {
        InvocationEngine {
            service,
            config,
            filter_cache: RwLock::new(HashMap::new()),
        }
    }

    /// The service this engine drives
    pub fn service(&self) -> &Arc<DomainService> {
        &self.service
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of descriptors with a resolved filter list
    pub fn cached_methods(&self) -> EngineResult<usize> {
        let cache = self.filter_cache.read().map_err(|_| {
            EngineError::SyncError("Failed to acquire read lock on filter cache".to_string())
        })?;
        Ok(cache.len())
    }

    /// Execute a result-less operation
    pub async fn execute(
        &self,
        call: Arc<CallContext>,
        descriptor: &MethodDescriptor,
    ) -> EngineResult<()> {
        self.run(call, descriptor).await.map(|_| ())
    }

    /// Execute an operation and deserialize its produced result.
    ///
    /// A call completed early with no result yields `Value::Null`, so
    /// callers that can legitimately receive nothing ask for an `Option`.
    pub async fn execute_typed<T: DeserializeOwned>(
        &self,
        call: Arc<CallContext>,
        descriptor: &MethodDescriptor,
    ) -> EngineResult<T> {
        let result = self.run(call, descriptor).await?;
        let value = result.unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|err| {
            EngineError::DeserializationFailed(format!("Result of {}: {}", descriptor, err))
        })
    }

    async fn run(
        &self,
        call: Arc<CallContext>,
        descriptor: &MethodDescriptor,
    ) -> EngineResult<Option<Value>> {
        if descriptor.is_empty() {
            return Err(EngineError::InvalidArgument(
                "Method descriptor has an empty service or operation name".to_string(),
            ));
        }
        if !self.service.owns(descriptor) {
            return Err(EngineError::MethodNotOwned(format!(
                "{} is not a declared operation of service {}",
                descriptor,
                self.service.name()
            )));
        }
        let registration = self
            .service
            .registry()
            .get(descriptor)
            .ok_or_else(|| EngineError::handler_not_found(descriptor.to_string()))?;
        if self.config.strict_arguments {
            if let Some(arity) = registration.arity() {
                if call.arguments().len() != arity {
                    return Err(EngineError::InvalidArgument(format!(
                        "{} expects {} arguments, got {}",
                        descriptor,
                        arity,
                        call.arguments().len()
                    )));
                }
            }
        }

        let method_filters = self.method_filters(descriptor)?;
        let context = Arc::new(ExecutionContext::new(
            self.service.clone(),
            call.clone(),
            descriptor.clone(),
            call.arguments().to_vec(),
        ));
        let accessor = call.require_service::<ServiceAccessor>()?;
        accessor.set(self.service.clone())?;

        if self.config.trace_invocations {
            debug!(method = %descriptor, "dispatching invocation");
        }

        let result = AmbientCallScope::scope(context.clone(), async {
            match self.run_stages(&context, registration, &method_filters).await {
                Ok(()) => context.result(),
                Err(error) => {
                    if self.config.trace_invocations {
                        warn!(method = %descriptor, error = %error, "invocation failed");
                    }
                    self.on_exception_stage(&context, &method_filters, &error)
                        .await?;
                    if context.is_completed() {
                        context.result()
                    } else {
                        Err(error)
                    }
                }
            }
        })
        .await;

        // the release must not mask the call's own outcome
        let _ = accessor.clear();

        if self.config.trace_invocations {
            debug!(
                method = %descriptor,
                completed = context.is_completed(),
                "invocation finished"
            );
        }
        result
    }

    async fn run_stages(
        &self,
        context: &Arc<ExecutionContext>,
        registration: &MethodRegistration,
        method_filters: &[Arc<dyn ServiceFilter>],
    ) -> EngineResult<()> {
        let service_filters = self.service.filters()?;
        let call_filters = context.call_context().filters().to_vec();

        // before-invoke: service, then method, then call-scoped
        for filter in service_filters
            .iter()
            .chain(method_filters.iter())
            .chain(call_filters.iter())
        {
            filter.before_invoke(context).await?;
            if context.is_completed() {
                return Ok(());
            }
        }

        self.service.executing().raise(context.clone()).await?;
        if context.is_completed() {
            return Ok(());
        }

        let value = registration.invoke(context.clone()).await?;
        context.set_result(value)?;

        self.service.executed().raise(context.clone()).await?;
        if context.is_completed() {
            return Ok(());
        }

        // after-invoke unwinds: call-scoped, then method, then service
        for filter in call_filters
            .iter()
            .chain(method_filters.iter())
            .chain(service_filters.iter())
        {
            filter.after_invoke(context).await?;
            if context.is_completed() {
                return Ok(());
            }
        }
        Ok(())
    }

    async fn on_exception_stage(
        &self,
        context: &Arc<ExecutionContext>,
        method_filters: &[Arc<dyn ServiceFilter>],
        error: &EngineError,
    ) -> EngineResult<()> {
        let service_filters = self.service.filters()?;
        let call_filters = context.call_context().filters().to_vec();

        for filter in service_filters
            .iter()
            .chain(method_filters.iter())
            .chain(call_filters.iter())
        {
            filter.on_exception(context, error).await?;
        }
        Ok(())
    }

    fn method_filters(
        &self,
        descriptor: &MethodDescriptor,
    ) -> EngineResult<Arc<Vec<Arc<dyn ServiceFilter>>>> {
        {
            let cache = self.filter_cache.read().map_err(|_| {
                EngineError::SyncError("Failed to acquire read lock on filter cache".to_string())
            })?;
            if let Some(filters) = cache.get(descriptor) {
                return Ok(filters.clone());
            }
        }

        // racing callers may both resolve; the first insert wins and later
        // readers converge on it
        let resolved = Arc::new(self.service.registry().declared_filters(descriptor));
        let mut cache = self.filter_cache.write().map_err(|_| {
            EngineError::SyncError("Failed to acquire write lock on filter cache".to_string())
        })?;
        Ok(cache.entry(descriptor.clone()).or_insert(resolved).clone())
    }
}

impl std::fmt::Debug for InvocationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationEngine")
            .field("service", &self.service)
            .field("config", &self.config)
            .finish()
    }
}
