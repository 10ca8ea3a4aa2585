// Multi-subscriber lifecycle events
//
// Two event forms back the pipeline notifications and any custom
// notifications a service raises to its own subscribers. Both invoke
// subscribers in subscription order. The synchronous form is for side
// effects only; the asynchronous form awaits each subscriber before
// starting the next and aborts on the first failure, propagating it to the
// raiser.

use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;

use armature_error::{EngineError, EngineResult};

type SyncSubscriber<A> = Arc<dyn Fn(&A) + Send + Sync>;
type AsyncSubscriber<A> = Arc<dyn Fn(A) -> BoxFuture<'static, EngineResult<()>> + Send + Sync>;

/// Synchronous multi-subscriber event.
///
/// Subscribers are invoked for side effects only; they cannot cancel or
/// short-circuit anything.
pub struct SyncEvent<A> {
    subscribers: RwLock<Vec<SyncSubscriber<A>>>,
}

impl<A> SyncEvent<A> {
    /// Create an event with no subscribers
    pub fn new() -> Self {
        SyncEvent {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Add a subscriber. Subscription order is invocation order.
    pub fn subscribe<F>(&self, subscriber: F) -> EngineResult<()>
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.write().map_err(|_| {
            EngineError::SyncError("Failed to acquire write lock on subscribers".to_string())
        })?;
        subscribers.push(Arc::new(subscriber));
        Ok(())
    }

    /// Number of subscribers
    pub fn subscriber_count(&self) -> EngineResult<usize> {
        let subscribers = self.subscribers.read().map_err(|_| {
            EngineError::SyncError("Failed to acquire read lock on subscribers".to_string())
        })?;
        Ok(subscribers.len())
    }

    /// Invoke every subscriber in subscription order
    pub fn raise(&self, args: &A) -> EngineResult<()> {
        let snapshot = {
            let subscribers = self.subscribers.read().map_err(|_| {
                EngineError::SyncError("Failed to acquire read lock on subscribers".to_string())
            })?;
            subscribers.clone()
        };
        for subscriber in snapshot {
            (subscriber.as_ref())(args);
        }
        Ok(())
    }
}

impl<A> Default for SyncEvent<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Asynchronous multi-subscriber event.
///
/// Zero subscribers is valid; raising is then a no-op.
pub struct AsyncEvent<A> {
    subscribers: RwLock<Vec<AsyncSubscriber<A>>>,
}

impl<A: Clone + Send + 'static> AsyncEvent<A> {
    /// Create an event with no subscribers
    pub fn new() -> Self {
        AsyncEvent {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Add an asynchronous subscriber. Subscription order is invocation
    /// order.
    pub fn subscribe<F, Fut>(&self, subscriber: F) -> EngineResult<()>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<()>> + Send + 'static,
    {
        let mut subscribers = self.subscribers.write().map_err(|_| {
            EngineError::SyncError("Failed to acquire write lock on subscribers".to_string())
        })?;
        let subscriber =
            Arc::new(move |args: A| -> BoxFuture<'static, EngineResult<()>> {
                Box::pin(subscriber(args))
            });
        subscribers.push(subscriber);
        Ok(())
    }

    /// Number of subscribers
    pub fn subscriber_count(&self) -> EngineResult<usize> {
        let subscribers = self.subscribers.read().map_err(|_| {
            EngineError::SyncError("Failed to acquire read lock on subscribers".to_string())
        })?;
        Ok(subscribers.len())
    }

    /// Invoke every subscriber sequentially in subscription order, awaiting
    /// each before starting the next. The first failure aborts the
    /// remaining subscribers and propagates.
    pub async fn raise(&self, args: A) -> EngineResult<()> {
        let snapshot = {
            let subscribers = self.subscribers.read().map_err(|_| {
                EngineError::SyncError("Failed to acquire read lock on subscribers".to_string())
            })?;
            subscribers.clone()
        };
        for subscriber in snapshot {
            (subscriber.as_ref())(args.clone()).await?;
        }
        Ok(())
    }
}

impl<A: Clone + Send + 'static> Default for AsyncEvent<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sync_subscribers_run_in_subscription_order() {
        let event = SyncEvent::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = log.clone();
            event
                .subscribe(move |value: &u32| {
                    log.lock().unwrap().push(format!("{}:{}", tag, value));
                })
                .unwrap();
        }

        assert_eq!(event.subscriber_count().unwrap(), 3);
        event.raise(&7).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:7", "second:7", "third:7"]
        );
    }

    #[test]
    fn async_subscribers_run_sequentially() {
        let event = AsyncEvent::<String>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let log = log.clone();
            event
                .subscribe(move |name: String| {
                    let log = log.clone();
                    async move {
                        tokio::task::yield_now().await;
                        log.lock().unwrap().push(format!("{}:{}", tag, name));
                        Ok(())
                    }
                })
                .unwrap();
        }

        tokio_test::block_on(event.raise("restock".to_string())).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a:restock", "b:restock"]);
    }

    #[tokio::test]
    async fn failing_subscriber_aborts_the_rest() {
        let event = AsyncEvent::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        {
            let log = log.clone();
            event
                .subscribe(move |value: u32| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push(value);
                        Ok(())
                    }
                })
                .unwrap();
        }
        event
            .subscribe(|_value: u32| async {
                Err(EngineError::EventError("subscriber rejected".to_string()))
            })
            .unwrap();
        {
            let log = log.clone();
            event
                .subscribe(move |value: u32| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push(value + 100);
                        Ok(())
                    }
                })
                .unwrap();
        }

        let result = event.raise(9).await;
        assert!(matches!(result, Err(EngineError::EventError(_))));
        // third subscriber never ran
        assert_eq!(*log.lock().unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn raising_with_no_subscribers_is_a_noop() {
        let event = AsyncEvent::<u32>::new();
        assert_eq!(event.subscriber_count().unwrap(), 0);
        event.raise(1).await.unwrap();

        let sync_event = SyncEvent::<u32>::new();
        sync_event.raise(&1).unwrap();
    }
}
