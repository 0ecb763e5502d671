//! The message bus port and an in-memory transport.
//!
//! The dispatcher only ever talks to [`MessageBus`], so swapping in a real broker client is a
//! wiring change in `main`, not a dispatcher change. [`InMemoryBus`] is the default transport and
//! the one the integration tests drive.
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use log::*;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Message bus error: {0}")]
pub struct BusError(pub String);

/// A single message as it arrives off the bus. The raw body is kept verbatim so that a
/// not-ready message can be requeued without a decode/encode round trip.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub raw: String,
    pub offset: i64,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// The next message on any subscribed topic, or `None` when the queue is dry.
    async fn poll(&self) -> Result<Option<Delivery>, BusError>;
    async fn publish(&self, topic: &str, body: String) -> Result<(), BusError>;
    /// Schedules a publish after `delay` and returns immediately (fire-and-forget requeue).
    async fn publish_after(&self, topic: &str, body: String, delay: Duration) -> Result<(), BusError>;
    async fn commit(&self, offset: i64) -> Result<(), BusError>;
}

struct BusInner {
    subscriptions: Vec<String>,
    queue: Mutex<VecDeque<Delivery>>,
    history: Mutex<Vec<(String, String)>>,
    next_offset: AtomicI64,
    committed: AtomicI64,
}

/// A process-local bus backed by a queue. Messages published to a subscribed topic are delivered
/// back through [`MessageBus::poll`]; everything published is also kept in a history log so tests
/// (and operators debugging with a REPL) can inspect outbound traffic.
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<BusInner>,
}

impl InMemoryBus {
    pub fn subscribed_to(topics: &[&str]) -> Self {
        let inner = BusInner {
            subscriptions: topics.iter().map(|t| t.to_string()).collect(),
            queue: Mutex::new(VecDeque::new()),
            history: Mutex::new(Vec::new()),
            next_offset: AtomicI64::new(0),
            committed: AtomicI64::new(-1),
        };
        Self { inner: Arc::new(inner) }
    }

    fn enqueue(&self, topic: &str, body: String) {
        let mut history = self.inner.history.lock().unwrap_or_else(|e| e.into_inner());
        history.push((topic.to_string(), body.clone()));
        drop(history);
        if !self.inner.subscriptions.iter().any(|t| t == topic) {
            trace!("📬️ Message on {topic} recorded but not queued (no subscription)");
            return;
        }
        let offset = self.inner.next_offset.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.push_back(Delivery { topic: topic.to_string(), raw: body, offset });
    }

    /// Every body published to the given topic, in publish order.
    pub fn published_to(&self, topic: &str) -> Vec<String> {
        let history = self.inner.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().filter(|(t, _)| t == topic).map(|(_, body)| body.clone()).collect()
    }

    /// The highest committed offset, or -1 if nothing has been committed yet.
    pub fn committed(&self) -> i64 {
        self.inner.committed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn poll(&self) -> Result<Option<Delivery>, BusError> {
        let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
        Ok(queue.pop_front())
    }

    async fn publish(&self, topic: &str, body: String) -> Result<(), BusError> {
        self.enqueue(topic, body);
        Ok(())
    }

    async fn publish_after(&self, topic: &str, body: String, delay: Duration) -> Result<(), BusError> {
        let bus = self.clone();
        let topic = topic.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bus.enqueue(&topic, body);
        });
        Ok(())
    }

    async fn commit(&self, offset: i64) -> Result<(), BusError> {
        self.inner.committed.fetch_max(offset, Ordering::SeqCst);
        Ok(())
    }
}
