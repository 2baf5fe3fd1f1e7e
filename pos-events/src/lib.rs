//! In-process event bus.
//!
//! The order engine and payment orchestrator emit domain events (order
//! status transitions, payment outcomes); the real-time hub subscribes and
//! fans them out to connected WebSocket clients. `EventBus` is a trait so a
//! wire-backed implementation (e.g. one that also publishes to a message
//! broker for cross-process fan-out) can be swapped in without touching
//! callers — `LocalEventBus` is the only implementation shipped here.
//!
//! Dispatch is by `TypeId`, not by serializing and matching a topic string;
//! the `Serialize`/`DeserializeOwned` bounds on the trait are compile-time
//! only; `LocalEventBus` never actually serializes an event.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};

pub const DEFAULT_MAX_CONCURRENCY: usize = 1024;

/// Typed publish/subscribe with bounded concurrent fan-out.
pub trait EventBus: Send + Sync {
    fn subscribe<E, F, Fut>(&self, handler: F) -> impl Future<Output = ()> + Send
    where
        E: serde::de::DeserializeOwned + Send + Sync + 'static,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static;

    /// Fire-and-forget: each subscriber handler runs on its own spawned task.
    fn emit<E>(&self, event: E) -> impl Future<Output = ()> + Send
    where
        E: serde::Serialize + Send + Sync + 'static;

    /// Like `emit`, but waits for every subscriber's handler to finish. Used
    /// by the order engine so a status-change event is guaranteed delivered
    /// to the real-time hub's room registry before the HTTP response for the
    /// triggering request returns.
    fn emit_and_wait<E>(&self, event: E) -> impl Future<Output = ()> + Send
    where
        E: serde::Serialize + Send + Sync + 'static;

    fn clear(&self) -> impl Future<Output = ()> + Send;
}

type Handler = Arc<
    dyn Fn(Arc<dyn Any + Send + Sync>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
>;

/// In-process event bus with typed pub/sub and semaphore-based backpressure.
#[derive(Clone)]
pub struct LocalEventBus {
    handlers: Arc<RwLock<HashMap<TypeId, Vec<Handler>>>>,
    semaphore: Option<Arc<Semaphore>>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::with_concurrency(DEFAULT_MAX_CONCURRENCY)
    }

    pub fn with_concurrency(max_concurrent: usize) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            semaphore: Some(Arc::new(Semaphore::new(max_concurrent))),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            semaphore: None,
        }
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for LocalEventBus {
    fn subscribe<E, F, Fut>(&self, handler: F) -> impl Future<Output = ()> + Send
    where
        E: serde::de::DeserializeOwned + Send + Sync + 'static,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handlers = self.handlers.clone();
        async move {
            let type_id = TypeId::of::<E>();
            let handler: Handler = Arc::new(move |any| {
                let event = any.downcast::<E>().expect("event type mismatch");
                Box::pin(handler(event))
            });
            let mut map = handlers.write().await;
            map.entry(type_id).or_default().push(handler);
        }
    }

    fn emit<E>(&self, event: E) -> impl Future<Output = ()> + Send
    where
        E: serde::Serialize + Send + Sync + 'static,
    {
        let handlers = self.handlers.clone();
        let semaphore = self.semaphore.clone();
        async move {
            dispatch(&handlers, semaphore, event, false).await;
        }
    }

    fn emit_and_wait<E>(&self, event: E) -> impl Future<Output = ()> + Send
    where
        E: serde::Serialize + Send + Sync + 'static,
    {
        let handlers = self.handlers.clone();
        let semaphore = self.semaphore.clone();
        async move {
            dispatch(&handlers, semaphore, event, true).await;
        }
    }

    fn clear(&self) -> impl Future<Output = ()> + Send {
        let handlers = self.handlers.clone();
        async move {
            handlers.write().await.clear();
        }
    }
}

async fn dispatch<E>(
    handlers: &Arc<RwLock<HashMap<TypeId, Vec<Handler>>>>,
    semaphore: Option<Arc<Semaphore>>,
    event: E,
    wait: bool,
) where
    E: Send + Sync + 'static,
{
    let type_id = TypeId::of::<E>();
    let event = Arc::new(event) as Arc<dyn Any + Send + Sync>;
    let map = handlers.read().await;
    let Some(subs) = map.get(&type_id) else {
        return;
    };
    let mut tasks = Vec::with_capacity(subs.len());
    for handler in subs {
        let h = handler.clone();
        let e = event.clone();
        let task = match &semaphore {
            Some(sem) => {
                let permit = sem.clone().acquire_owned().await.expect("semaphore closed");
                tokio::spawn(async move {
                    h(e).await;
                    drop(permit);
                })
            }
            None => tokio::spawn(async move {
                h(e).await;
            }),
        };
        tasks.push(task);
    }
    if wait {
        for task in tasks {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Ping(u32);

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = LocalEventBus::new();
        let notify = Arc::new(Notify::new());
        let received = Arc::new(AtomicUsize::new(0));
        {
            let received = received.clone();
            let notify = notify.clone();
            bus.subscribe::<Ping, _, _>(move |event| {
                let received = received.clone();
                let notify = notify.clone();
                async move {
                    received.store(event.0 as usize, Ordering::SeqCst);
                    notify.notify_one();
                }
            })
            .await;
        }
        bus.emit_and_wait(Ping(42)).await;
        assert_eq!(received.load(Ordering::SeqCst), 42);
    }

    #[tokio::test]
    async fn unrelated_event_types_do_not_cross_talk() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Other(u32);

        let bus = LocalEventBus::new();
        let hit = Arc::new(AtomicUsize::new(0));
        {
            let hit = hit.clone();
            bus.subscribe::<Ping, _, _>(move |_| {
                let hit = hit.clone();
                async move {
                    hit.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        }
        bus.emit_and_wait(Other(1)).await;
        assert_eq!(hit.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn clear_removes_all_subscribers() {
        let bus = LocalEventBus::new();
        let hit = Arc::new(AtomicUsize::new(0));
        {
            let hit = hit.clone();
            bus.subscribe::<Ping, _, _>(move |_| {
                let hit = hit.clone();
                async move {
                    hit.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        }
        bus.clear().await;
        bus.emit_and_wait(Ping(1)).await;
        assert_eq!(hit.load(Ordering::SeqCst), 0);
    }
}
