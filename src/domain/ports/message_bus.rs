use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentId, Message};

/// Receives messages delivered to one subscribed identity.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> DomainResult<()>;
}

/// Point-to-point publish/subscribe transport keyed by agent identity.
///
/// Delivery is at-most-once and FIFO per receiver. Publishing to an identity
/// with no subscriber drops the message; a full receiver queue is reported
/// as `DomainError::BusCapacity`.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, message: Message) -> DomainResult<()>;

    /// Register `handler` for `agent`, replacing any previous subscription.
    async fn subscribe(&self, agent: AgentId, handler: Arc<dyn MessageHandler>)
        -> DomainResult<()>;

    /// Remove the subscription for `agent`. Idempotent.
    async fn unsubscribe(&self, agent: AgentId) -> DomainResult<()>;

    async fn is_subscribed(&self, agent: AgentId) -> bool;
}
