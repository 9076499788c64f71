//! In-process message bus.
//!
//! Every subscription owns a bounded `mpsc` queue drained by a single
//! dispatcher task, so messages to one receiver are handled strictly in
//! publish order. Dispatchers are cancelled through a `CancellationToken`
//! derived from the bus root token.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentId, Message};
use crate::domain::ports::{MessageBus, MessageHandler};

/// Capacity of the observation channel returned by [`InProcessMessageBus::watch`].
const WATCH_CAPACITY: usize = 1024;

/// Counters for bus activity.
#[derive(Debug, Default)]
pub struct BusStats {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
    pub dropped: AtomicU64,
    pub rejected: AtomicU64,
    pub handler_failures: AtomicU64,
}

/// Point-in-time copy of [`BusStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStatsSnapshot {
    /// Accepted into a receiver queue
    pub published: u64,
    /// Handed to a handler that returned normally
    pub delivered: u64,
    /// No subscriber, or the subscriber went away
    pub dropped: u64,
    /// Refused because the receiver queue was full
    pub rejected: u64,
    /// Handler returned an error or panicked
    pub handler_failures: u64,
}

impl BusStats {
    pub fn snapshot(&self) -> BusStatsSnapshot {
        BusStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

struct Subscription {
    sender: mpsc::Sender<Message>,
    token: CancellationToken,
}

/// Bus delivering each message to the single handler subscribed under its receiver.
pub struct InProcessMessageBus {
    subscribers: RwLock<HashMap<AgentId, Subscription>>,
    capacity: usize,
    root: CancellationToken,
    watch_tx: broadcast::Sender<Message>,
    stats: Arc<BusStats>,
}

impl InProcessMessageBus {
    /// Create a bus whose per-receiver queues hold at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        let (watch_tx, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            root: CancellationToken::new(),
            watch_tx,
            stats: Arc::new(BusStats::default()),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> BusStatsSnapshot {
        self.stats.snapshot()
    }

    /// Observe every message accepted for delivery, in acceptance order.
    pub fn watch(&self) -> broadcast::Receiver<Message> {
        self.watch_tx.subscribe()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Cancel every dispatcher and forget all subscriptions.
    pub async fn shutdown(&self) {
        self.root.cancel();
        self.subscribers.write().await.clear();
        tracing::info!("message bus shut down");
    }

    fn spawn_dispatcher(
        &self,
        agent: AgentId,
        handler: Arc<dyn MessageHandler>,
        mut rx: mpsc::Receiver<Message>,
        token: CancellationToken,
    ) {
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(message) => dispatch(handler.as_ref(), message, &stats).await,
                        None => break,
                    },
                }
            }
            tracing::debug!(agent_id = %agent, "dispatcher stopped");
        });
    }
}

impl Default for InProcessMessageBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Run one handler invocation, isolating errors and panics to this message.
async fn dispatch(handler: &dyn MessageHandler, message: Message, stats: &BusStats) {
    let id = message.id;
    let kind = message.kind;
    let receiver = message.receiver;

    match AssertUnwindSafe(handler.handle(message)).catch_unwind().await {
        Ok(Ok(())) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(e)) => {
            stats.handler_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(message_id = %id, %kind, %receiver, error = %e, "message handler failed");
        }
        Err(_) => {
            stats.handler_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(message_id = %id, %kind, %receiver, "message handler panicked");
        }
    }
}

#[async_trait]
impl MessageBus for InProcessMessageBus {
    async fn publish(&self, message: Message) -> DomainResult<()> {
        let sender = {
            let subscribers = self.subscribers.read().await;
            subscribers.get(&message.receiver).map(|s| s.sender.clone())
        };

        let Some(sender) = sender else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                message_id = %message.id,
                kind = %message.kind,
                receiver = %message.receiver,
                "no subscriber; message dropped"
            );
            return Ok(());
        };

        let observed = message.clone();
        match sender.try_send(message) {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                // No watchers is fine.
                let _ = self.watch_tx.send(observed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    message_id = %message.id,
                    receiver = %message.receiver,
                    capacity = self.capacity,
                    "receiver queue full"
                );
                Err(DomainError::BusCapacity {
                    receiver: message.receiver,
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    message_id = %message.id,
                    receiver = %message.receiver,
                    "subscriber closed; message dropped"
                );
                Ok(())
            }
        }
    }

    async fn subscribe(
        &self,
        agent: AgentId,
        handler: Arc<dyn MessageHandler>,
    ) -> DomainResult<()> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let token = self.root.child_token();
        self.spawn_dispatcher(agent, handler, rx, token.clone());

        let previous = self
            .subscribers
            .write()
            .await
            .insert(agent, Subscription { sender: tx, token });

        if let Some(previous) = previous {
            previous.token.cancel();
            tracing::debug!(agent_id = %agent, "replaced existing subscription");
        }
        tracing::debug!(agent_id = %agent, "subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, agent: AgentId) -> DomainResult<()> {
        if let Some(subscription) = self.subscribers.write().await.remove(&agent) {
            subscription.token.cancel();
            tracing::debug!(agent_id = %agent, "unsubscribed");
        }
        Ok(())
    }

    async fn is_subscribed(&self, agent: AgentId) -> bool {
        self.subscribers.read().await.contains_key(&agent)
    }
}
