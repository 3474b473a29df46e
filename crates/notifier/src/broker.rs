//! In-process publish/subscribe broker.
//!
//! Topics are plain strings. Every subscriber owns a bounded queue drained by its
//! own task, so a slow handler only delays its own deliveries. Each handler call
//! is bounded by a timeout. Publishing never blocks: a full queue drops the event
//! for that subscriber only.
//!
//! There is no persistence and no delivery guarantee. Publishing to a topic with
//! no subscribers drops the payload.
//!
//! A subscription ends when its handler returns [`BrokerError::SubscriberClosed`]
//! or when its [`Subscription`] handle is unsubscribed. Consumers whose lifetime
//! is tied to something else (an HTTP stream, say) hold a [`SubscriptionGuard`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Errors a subscriber handler can report.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The consumer behind this handler is gone; the subscription ends.
    #[error("subscriber closed")]
    SubscriberClosed,

    #[error("handler failed: {0}")]
    Handler(String),
}

/// Broker tuning.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Events buffered per subscriber before new ones are dropped.
    pub queue_capacity: usize,
    /// Upper bound on a single handler invocation.
    pub handler_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            handler_timeout: Duration::from_secs(5),
        }
    }
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Value>,
}

struct BrokerInner {
    config: BrokerConfig,
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

/// Topic-addressed fan-out broker. Cheap to clone.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                config,
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler` for `topic`.
    ///
    /// Spawns the subscriber's worker task, so this must be called from within a
    /// Tokio runtime. The handler lives until it returns
    /// [`BrokerError::SubscriberClosed`] or the returned handle is unsubscribed.
    /// Dropping the handle leaves the subscription in place.
    pub fn subscribe<F, Fut>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BrokerError>> + Send + 'static,
    {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, mut receiver) = mpsc::channel(self.inner.config.queue_capacity.max(1));
        let handler_timeout = self.inner.config.handler_timeout;
        let worker_topic = topic.clone();

        tokio::spawn(async move {
            while let Some(payload) = receiver.recv().await {
                match tokio::time::timeout(handler_timeout, handler(payload)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(BrokerError::SubscriberClosed)) => {
                        tracing::debug!(topic = %worker_topic, subscriber = id, "Subscriber closed");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(
                            topic = %worker_topic,
                            subscriber = id,
                            error = %e,
                            "Subscriber handler failed"
                        );
                    }
                    Err(_) => {
                        tracing::warn!(
                            topic = %worker_topic,
                            subscriber = id,
                            timeout_ms = handler_timeout.as_millis() as u64,
                            "Subscriber handler timed out"
                        );
                    }
                }
            }
        });

        self.inner
            .topics
            .write()
            .entry(topic.clone())
            .or_default()
            .push(Subscriber { id, sender });

        tracing::debug!(topic = %topic, subscriber = id, "Subscribed");

        Subscription {
            broker: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// Queue `payload` for every subscriber of `topic`.
    ///
    /// Returns the number of subscribers the payload was queued for.
    pub fn publish(&self, topic: &str, payload: Value) -> usize {
        let mut queued = 0;
        let mut saw_closed = false;

        {
            let topics = self.inner.topics.read();
            let Some(subscribers) = topics.get(topic) else {
                tracing::trace!(topic, "No subscribers, event dropped");
                return 0;
            };

            for subscriber in subscribers {
                match subscriber.sender.try_send(payload.clone()) {
                    Ok(()) => queued += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            topic,
                            subscriber = subscriber.id,
                            "Subscriber queue full, event dropped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }

        if saw_closed {
            self.prune(topic);
        }

        queued
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .get(topic)
            .map(|subs| subs.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }

    fn prune(&self, topic: &str) {
        let mut topics = self.inner.topics.write();
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|s| !s.sender.is_closed());
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

impl BrokerInner {
    /// Drop subscriber `id` from `topic`. Its worker drains what is already
    /// queued and then exits.
    fn remove(&self, topic: &str, id: u64) -> bool {
        let mut topics = self.topics.write();
        let Some(subscribers) = topics.get_mut(topic) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() < before;
        if subscribers.is_empty() {
            topics.remove(topic);
        }
        removed
    }
}

/// Handle to one registered handler.
#[derive(Debug)]
pub struct Subscription {
    broker: Weak<BrokerInner>,
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove the handler from its topic.
    ///
    /// Returns `false` if it was already gone (closed by its handler, or the
    /// broker was dropped).
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.broker.upgrade() else {
            return false;
        };
        let removed = inner.remove(&self.topic, self.id);
        if removed {
            tracing::debug!(topic = %self.topic, subscriber = self.id, "Unsubscribed");
        }
        removed
    }

    /// Turn the handle into a guard that unsubscribes when dropped.
    pub fn unsubscribe_on_drop(self) -> SubscriptionGuard {
        SubscriptionGuard {
            subscription: Some(self),
        }
    }
}

/// Unsubscribes on drop. Created by [`Subscription::unsubscribe_on_drop`].
#[derive(Debug)]
pub struct SubscriptionGuard {
    subscription: Option<Subscription>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}
