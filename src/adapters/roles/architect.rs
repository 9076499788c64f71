//! Architect (Daedalus): hybrid neuro-symbolic architecture designs.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{accept_collaboration, audit_self_report, generic_result, relay_alert_downward, simulate};
use crate::domain::models::{AgentRole, Message, MessageKind, Task};
use crate::domain::ports::{AgentContext, RoleBehavior};

const PATHWAYS: [&str; 4] = [
    "transformer_architectures",
    "symbolic_reasoning",
    "neuro_symbolic_integration",
    "memory_architectures",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct ArchitectBehavior;

impl ArchitectBehavior {
    fn hybrid_core() -> Value {
        json!({
            "type": "architecture_design_complete",
            "neural_subsystem": {
                "perception": "multimodal_transformer",
                "vision": "convolutional_transformer",
                "language": "gpt_style_decoder",
                "memory": "retrieval_augmented",
            },
            "symbolic_subsystem": {
                "knowledge": "semantic_network",
                "logic": "first_order_logic",
                "search": "neural_guided",
                "planning": "hierarchical_planner",
            },
            "integration": {
                "controller": "dual_process_controller",
                "shared_memory": "unified_memory_buffer",
                "attention": "global_workspace",
            },
        })
    }

    fn explore(pathway: &str) -> anyhow::Result<Value> {
        if !PATHWAYS.contains(&pathway) {
            anyhow::bail!("unknown architectural pathway '{pathway}'");
        }
        Ok(json!({
            "type": "pathway_exploration_complete",
            "pathway": pathway,
            "promising": true,
        }))
    }

    fn refine(feedback: &Value) -> Value {
        let sources: Vec<&str> = ["logos", "odysseus", "themis"]
            .into_iter()
            .filter(|k| feedback.get(k).is_some())
            .collect();
        json!({
            "refined_architecture": Self::hybrid_core(),
            "feedback_integrated": sources,
        })
    }
}

#[async_trait]
impl RoleBehavior for ArchitectBehavior {
    fn role(&self) -> AgentRole {
        AgentRole::Architect
    }

    fn handled_kinds(&self) -> &'static [MessageKind] {
        &[
            MessageKind::Directive,
            MessageKind::CollaborationRequest,
            MessageKind::AuditRequest,
            MessageKind::SafetyAlert,
        ]
    }

    async fn execute(&self, _ctx: &dyn AgentContext, task: &Task) -> anyhow::Result<Value> {
        simulate(task).await?;
        let name = task.name.to_lowercase();
        if name.contains("hybrid") && name.contains("core") {
            return Ok(Self::hybrid_core());
        }
        if name.contains("explore") || name.contains("pathway") {
            let pathway = task.metadata_str("pathway").unwrap_or(PATHWAYS[0]);
            return Ok(json!({ "exploration_result": Self::explore(pathway)? }));
        }
        if name.contains("refine") {
            let feedback = task.metadata.get("feedback").cloned().unwrap_or_default();
            return Ok(Self::refine(&feedback));
        }
        Ok(generic_result("Architecture", task))
    }

    async fn handle_message(
        &self,
        ctx: &dyn AgentContext,
        message: &Message,
    ) -> anyhow::Result<Option<Message>> {
        match message.kind {
            MessageKind::Directive => {
                tracing::info!(agent_id = %ctx.agent_id(), directive = %message.content, "directive received");
                Ok(None)
            }
            MessageKind::CollaborationRequest => Ok(Some(accept_collaboration(
                message,
                json!({ "symbolic_subsystem": Self::hybrid_core()["symbolic_subsystem"] }),
            ))),
            MessageKind::AuditRequest => Ok(Some(audit_self_report(
                ctx,
                message,
                json!({ "pathways": PATHWAYS }),
            ))),
            MessageKind::SafetyAlert => {
                relay_alert_downward(ctx, message).await;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn detail(&self) -> Value {
        json!({ "pathways": PATHWAYS })
    }
}
