//! Reasoner (Logos): formal logic systems, knowledge graphs and trace checks.

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{accept_collaboration, audit_self_report, generic_result, relay_alert_downward, simulate};
use crate::domain::models::{AgentRole, Message, MessageKind, Task};
use crate::domain::ports::{AgentContext, RoleBehavior};

const LOGIC_SYSTEMS: [&str; 4] = ["propositional", "first_order", "temporal", "modal"];

#[derive(Debug, Default, Clone, Copy)]
pub struct ReasonerBehavior;

impl ReasonerBehavior {
    fn logic_systems() -> Value {
        json!({
            "type": "logic_systems_complete",
            "systems": LOGIC_SYSTEMS,
            "integration": "unified_inference_engine",
        })
    }

    fn knowledge_graph(domain: &str) -> Value {
        json!({
            "domain": domain,
            "entities": ["agent", "task", "knowledge", "reasoning"],
            "relations": ["performs", "requires", "uses", "produces"],
        })
    }

    /// Every step needs a `type`; unknown step types are invalid.
    fn verify_trace(trace: &[Value]) -> Value {
        let steps: Vec<Value> = trace
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let kind = step.get("type").and_then(Value::as_str).unwrap_or("unknown");
                let valid = matches!(kind, "inference" | "assumption" | "conclusion");
                json!({ "step": index, "type": kind, "valid": valid })
            })
            .collect();
        let valid = steps.iter().all(|s| s["valid"] == true);
        json!({ "valid": valid, "steps": steps })
    }
}

#[async_trait]
impl RoleBehavior for ReasonerBehavior {
    fn role(&self) -> AgentRole {
        AgentRole::Reasoner
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
        if name.contains("logic") && name.contains("system") {
            return Ok(Self::logic_systems());
        }
        if name.contains("knowledge") && name.contains("graph") {
            let domain = task.metadata_str("domain").unwrap_or("agi_research");
            return Ok(Self::knowledge_graph(domain));
        }
        if name.contains("verify") {
            let Some(trace) = task.metadata.get("reasoning_trace").and_then(Value::as_array) else {
                bail!("verification task needs a reasoning_trace array");
            };
            return Ok(json!({ "verification_result": Self::verify_trace(trace) }));
        }
        Ok(generic_result("Symbolic reasoning", task))
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
                json!({
                    "logic_engine": ["resolution_with_paramodulation", "tableau_with_caching"],
                    "knowledge_graph": "owl_reasoning",
                }),
            ))),
            MessageKind::AuditRequest => Ok(Some(audit_self_report(
                ctx,
                message,
                json!({ "logic_systems": LOGIC_SYSTEMS }),
            ))),
            MessageKind::SafetyAlert => {
                relay_alert_downward(ctx, message).await;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn detail(&self) -> Value {
        json!({ "logic_systems": LOGIC_SYSTEMS })
    }
}
