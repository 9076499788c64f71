//! Standard role behaviours with mocked domain payloads.
//!
//! Payloads are canned: these behaviours exist so the coordination runtime
//! has realistic work to route, fail and audit. Every role honours two task
//! metadata keys: `simulate_failure` (string, the action fails with it) and
//! `simulate_delay_ms` (integer, the action sleeps first).

pub mod architect;
pub mod coordinator;
pub mod explorer;
pub mod reasoner;

pub use architect::ArchitectBehavior;
pub use coordinator::CoordinatorBehavior;
pub use explorer::ExplorerBehavior;
pub use reasoner::ReasonerBehavior;

use anyhow::bail;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::{AgentRole, Message, MessageKind, Task};
use crate::domain::ports::{AgentContext, BehaviorFactory, RoleBehavior};

/// Factory for the four non-overseer roles.
///
/// The Overseer is bound by the registry to its safety interlock, so this
/// factory returns `None` for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardBehaviors;

impl StandardBehaviors {
    pub const fn new() -> Self {
        Self
    }
}

impl BehaviorFactory for StandardBehaviors {
    fn create(&self, role: AgentRole) -> Option<Arc<dyn RoleBehavior>> {
        match role {
            AgentRole::Coordinator => Some(Arc::new(CoordinatorBehavior::new())),
            AgentRole::Architect => Some(Arc::new(ArchitectBehavior)),
            AgentRole::Reasoner => Some(Arc::new(ReasonerBehavior)),
            AgentRole::Explorer => Some(Arc::new(ExplorerBehavior)),
            AgentRole::Overseer => None,
        }
    }
}

/// Apply the simulation knobs carried in task metadata.
pub(crate) async fn simulate(task: &Task) -> anyhow::Result<()> {
    if let Some(delay) = task
        .metadata
        .get("simulate_delay_ms")
        .and_then(Value::as_u64)
    {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if let Some(reason) = task.metadata_str("simulate_failure") {
        bail!("{reason}");
    }
    Ok(())
}

/// Generic result for tasks no keyword matched.
pub(crate) fn generic_result(area: &str, task: &Task) -> Value {
    json!({
        "status": "completed",
        "message": format!("{area} task {} completed", task.name),
    })
}

/// Forward a safety alert from the supervisor to this agent's own subordinates.
pub(crate) async fn relay_alert_downward(ctx: &dyn AgentContext, message: &Message) {
    if ctx.supervisor().await != Some(message.sender) {
        tracing::warn!(
            agent_id = %ctx.agent_id(),
            from = %message.sender,
            alert = %message.content,
            "safety alert received"
        );
        return;
    }
    let relay = json!({
        "type": "safety_alert",
        "alert": message.content,
        "relayed_by": ctx.agent_id(),
        "action_required": true,
    });
    let outcome = ctx
        .broadcast_to_subordinates(MessageKind::SafetyAlert, relay)
        .await;
    tracing::warn!(
        agent_id = %ctx.agent_id(),
        relayed_to = outcome.delivered.len(),
        failed = outcome.failed.len(),
        "safety alert relayed"
    );
}

/// Self-report answering an audit request.
pub(crate) fn audit_self_report(ctx: &dyn AgentContext, message: &Message, state: Value) -> Message {
    message.reply(
        MessageKind::AuditResponse,
        json!({
            "agent_id": ctx.agent_id(),
            "role": ctx.role(),
            "internal_state": state,
        }),
    )
}

/// Accepts a collaboration request, echoing its `type`.
pub(crate) fn accept_collaboration(message: &Message, contribution: Value) -> Message {
    message.reply(
        MessageKind::CollaborationResponse,
        json!({
            "type": "collaboration_accept",
            "request_type": message.content_str("type").unwrap_or("general"),
            "contribution": contribution,
        }),
    )
}
