//! The role-action plugin seam.
//!
//! Each agent runtime is bound to one `RoleBehavior`. The runtime owns the
//! lifecycle, bus subscription and task state machine; the behaviour only
//! produces task results and message replies.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentId, AgentRole, Message, MessageId, MessageKind, Task};

/// Result of a fan-out send to direct subordinates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastOutcome {
    pub delivered: Vec<AgentId>,
    pub failed: Vec<(AgentId, String)>,
}

impl BroadcastOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What a behaviour may do on behalf of the agent it is bound to.
#[async_trait]
pub trait AgentContext: Send + Sync {
    fn agent_id(&self) -> AgentId;

    fn role(&self) -> AgentRole;

    async fn supervisor(&self) -> Option<AgentId>;

    async fn subordinates(&self) -> Vec<AgentId>;

    /// Publish a message from this agent.
    async fn send(
        &self,
        receiver: AgentId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> DomainResult<MessageId>;

    /// Send to the supervisor; `Ok(None)` when the agent has none.
    async fn report_to_supervisor(
        &self,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> DomainResult<Option<MessageId>> {
        match self.supervisor().await {
            Some(supervisor) => self.send(supervisor, kind, content).await.map(Some),
            None => Ok(None),
        }
    }

    /// Send the same message to every direct subordinate, continuing past failures.
    async fn broadcast_to_subordinates(
        &self,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        for subordinate in self.subordinates().await {
            match self.send(subordinate, kind, content.clone()).await {
                Ok(_) => outcome.delivered.push(subordinate),
                Err(e) => outcome.failed.push((subordinate, e.to_string())),
            }
        }
        outcome
    }
}

/// Role-specific behaviour bound to an agent runtime.
#[async_trait]
pub trait RoleBehavior: Send + Sync {
    fn role(&self) -> AgentRole;

    /// Message kinds this role has a handler for. Others are ignored.
    fn handled_kinds(&self) -> &'static [MessageKind];

    /// Perform the task's domain action. Errors become a `Failed` task.
    async fn execute(&self, ctx: &dyn AgentContext, task: &Task) -> anyhow::Result<serde_json::Value>;

    /// Handle one delivered message, optionally producing a reply to publish.
    async fn handle_message(
        &self,
        ctx: &dyn AgentContext,
        message: &Message,
    ) -> anyhow::Result<Option<Message>>;

    /// Role-specific status detail.
    async fn detail(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Binds roles to behaviour instances when the registry creates agents.
pub trait BehaviorFactory: Send + Sync {
    /// `None` when no behaviour is bound to `role`.
    fn create(&self, role: AgentRole) -> Option<Arc<dyn RoleBehavior>>;
}
