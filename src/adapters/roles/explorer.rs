//! Explorer (Odysseus): simulation environments and embodied exploration.

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{accept_collaboration, audit_self_report, generic_result, relay_alert_downward, simulate};
use crate::domain::models::{AgentRole, Message, MessageKind, Task};
use crate::domain::ports::{AgentContext, RoleBehavior};

const ENVIRONMENTS: [&str; 4] = ["physics_sim", "3d_world", "language_sim", "robotics_sim"];
const TOOLS: [&str; 4] = [
    "scientific_databases",
    "code_execution",
    "web_apis",
    "data_analysis",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct ExplorerBehavior;

impl ExplorerBehavior {
    fn design_environment(spec: &Value) -> Value {
        let env_type = spec.get("type").and_then(Value::as_str).unwrap_or("general");
        json!({
            "type": "simulation_environment_designed",
            "environment": {
                "type": env_type,
                "observation_space": ["rgb_image", "depth_map", "joint_positions"],
                "action_space": ["continuous", "discrete"],
                "physics": "rigid_body",
            },
        })
    }

    fn explore(environment: &str, steps: u64) -> anyhow::Result<Value> {
        if !ENVIRONMENTS.contains(&environment) {
            bail!("unknown environment '{environment}'");
        }
        Ok(json!({
            "environment": environment,
            "steps": steps,
            "discoveries": steps / 25,
        }))
    }

    fn use_tool(tool: &str) -> anyhow::Result<Value> {
        if !TOOLS.contains(&tool) {
            bail!("unknown tool '{tool}'");
        }
        Ok(json!({ "tool": tool, "status": "success" }))
    }
}

#[async_trait]
impl RoleBehavior for ExplorerBehavior {
    fn role(&self) -> AgentRole {
        AgentRole::Explorer
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
        if name.contains("simulation") && name.contains("design") {
            let spec = task
                .metadata
                .get("environment_spec")
                .cloned()
                .unwrap_or_else(|| json!({ "type": "physics_simulation" }));
            return Ok(json!({ "environment_design": Self::design_environment(&spec) }));
        }
        if name.contains("explore") {
            let environment = task.metadata_str("environment").unwrap_or(ENVIRONMENTS[0]);
            let steps = task.metadata.get("steps").and_then(Value::as_u64).unwrap_or(100);
            return Self::explore(environment, steps);
        }
        if name.contains("tool") {
            return Self::use_tool(task.metadata_str("tool").unwrap_or(TOOLS[0]));
        }
        Ok(generic_result("Embodied exploration", task))
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
                json!({ "environments": ENVIRONMENTS }),
            ))),
            MessageKind::AuditRequest => Ok(Some(audit_self_report(
                ctx,
                message,
                json!({ "environments": ENVIRONMENTS, "tools": TOOLS }),
            ))),
            MessageKind::SafetyAlert => {
                relay_alert_downward(ctx, message).await;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn detail(&self) -> Value {
        json!({ "environments": ENVIRONMENTS, "tools": TOOLS })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::roles::testing::FakeContext;

    #[tokio::test]
    async fn test_simulation_design_task() {
        let ctx = FakeContext::new(AgentRole::Explorer);
        let task = Task::new(ctx.id, "Design Simulation Environment", "");
        let result = ExplorerBehavior.execute(&ctx, &task).await.unwrap();
        assert_eq!(result["environment_design"]["environment"]["type"], "physics_simulation");
    }

    #[tokio::test]
    async fn test_unknown_tool_fails() {
        let ctx = FakeContext::new(AgentRole::Explorer);
        let task = Task::new(ctx.id, "use tool", "").with_metadata("tool", json!("crystal_ball"));
        assert!(ExplorerBehavior.execute(&ctx, &task).await.is_err());
    }

    #[tokio::test]
    async fn test_audit_request_gets_self_report() {
        let ctx = FakeContext::new(AgentRole::Explorer);
        let auditor = crate::domain::models::AgentId::new();
        let request = Message::new(auditor, ctx.id, MessageKind::AuditRequest, json!({}));
        let reply = ExplorerBehavior
            .handle_message(&ctx, &request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.kind, MessageKind::AuditResponse);
        assert_eq!(reply.receiver, auditor);
    }
}
