//! Coordinator (Prometheus): research phases, reports and resource allocation.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{audit_self_report, generic_result, simulate};
use crate::domain::models::{AgentId, AgentRole, Message, MessageKind, Task};
use crate::domain::ports::{AgentContext, RoleBehavior};

/// Research phases in order.
pub const RESEARCH_PHASES: [&str; 3] = ["architecture_design", "embodied_learning", "safety_validation"];

const TOTAL_RESOURCE_UNITS: u64 = 100;

#[derive(Debug, Default)]
struct ProjectState {
    phase: usize,
    /// Latest report per agent.
    reports: HashMap<AgentId, Value>,
    alerts_relayed: u64,
}

#[derive(Debug, Default)]
pub struct CoordinatorBehavior {
    state: RwLock<ProjectState>,
}

impl CoordinatorBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current_phase(&self) -> &'static str {
        RESEARCH_PHASES[self.state.read().await.phase]
    }

    /// Task proposals for a research phase, keyed by the role that should run them.
    pub fn decompose_phase(phase: &str) -> Vec<(AgentRole, &'static str, &'static str)> {
        match phase {
            "architecture_design" => vec![
                (AgentRole::Architect, "Design Hybrid Neuro-Symbolic Core", "critical"),
                (AgentRole::Reasoner, "Develop Formal Logic Systems", "high"),
            ],
            "embodied_learning" => vec![(AgentRole::Explorer, "Design Simulation Environment", "high")],
            "safety_validation" => vec![(AgentRole::Overseer, "Comprehensive Safety Audit", "critical")],
            _ => Vec::new(),
        }
    }

    async fn plan(&self, ctx: &dyn AgentContext) -> Value {
        let phase = self.current_phase().await;
        let proposals: Vec<Value> = Self::decompose_phase(phase)
            .into_iter()
            .map(|(role, name, priority)| {
                json!({ "target_role": role, "name": name, "priority": priority, "phase": phase })
            })
            .collect();
        let outcome = ctx
            .broadcast_to_subordinates(
                MessageKind::Directive,
                json!({ "type": "phase_plan", "phase": phase, "tasks": proposals }),
            )
            .await;
        json!({
            "status": "completed",
            "current_phase": phase,
            "tasks_generated": proposals.len(),
            "tasks": proposals,
            "notified": outcome.delivered.len(),
        })
    }

    async fn allocate_resources(&self, ctx: &dyn AgentContext) -> Value {
        let subordinates = ctx.subordinates().await;
        let mut allocated = 0;
        if !subordinates.is_empty() {
            let share = TOTAL_RESOURCE_UNITS / subordinates.len() as u64;
            for agent in &subordinates {
                let content = json!({
                    "type": "resource_allocation",
                    "resources": { "compute_units": share, "memory_gb": share * 2, "priority_level": "normal" },
                });
                match ctx.send(*agent, MessageKind::Directive, content).await {
                    Ok(_) => allocated += 1,
                    Err(e) => tracing::warn!(agent_id = %agent, error = %e, "resource allocation not delivered"),
                }
            }
        }
        json!({
            "status": "completed",
            "total_resources": TOTAL_RESOURCE_UNITS,
            "agents_allocated": allocated,
        })
    }

    /// Merge the latest reports into one synthesis.
    pub async fn synthesize(&self) -> Value {
        let state = self.state.read().await;
        let mut insights = Vec::new();
        let mut challenges = Vec::new();
        let mut contributions = serde_json::Map::new();
        for (agent, report) in &state.reports {
            if let Some(items) = report.get("insights").and_then(Value::as_array) {
                insights.extend(items.iter().cloned());
            }
            if let Some(items) = report.get("challenges").and_then(Value::as_array) {
                challenges.extend(items.iter().cloned());
            }
            contributions.insert(agent.to_string(), report.clone());
        }
        json!({
            "phase": RESEARCH_PHASES[state.phase],
            "agent_contributions": contributions,
            "key_insights": insights,
            "challenges": challenges,
        })
    }

    /// Advance once every subordinate has reported and no critical challenge is open.
    async fn maybe_advance(&self, ctx: &dyn AgentContext) {
        let subordinates = ctx.subordinates().await;
        let synthesis = self.synthesize().await;
        let blocked = synthesis["challenges"]
            .as_array()
            .is_some_and(|c| c.iter().any(|ch| ch["severity"] == "critical"));
        let next = {
            let mut state = self.state.write().await;
            let all_reported = subordinates.iter().all(|s| state.reports.contains_key(s));
            if !all_reported || blocked || state.phase + 1 >= RESEARCH_PHASES.len() {
                return;
            }
            state.phase += 1;
            state.reports.clear();
            RESEARCH_PHASES[state.phase]
        };
        tracing::info!(agent_id = %ctx.agent_id(), phase = next, "advanced to next research phase");
        ctx.broadcast_to_subordinates(
            MessageKind::Directive,
            json!({ "type": "phase_transition", "new_phase": next }),
        )
        .await;
    }

    async fn snapshot(&self) -> Value {
        let state = self.state.read().await;
        json!({
            "current_phase": RESEARCH_PHASES[state.phase],
            "research_phases": RESEARCH_PHASES,
            "reports_received": state.reports.len(),
            "alerts_relayed": state.alerts_relayed,
        })
    }
}

#[async_trait]
impl RoleBehavior for CoordinatorBehavior {
    fn role(&self) -> AgentRole {
        AgentRole::Coordinator
    }

    fn handled_kinds(&self) -> &'static [MessageKind] {
        &[
            MessageKind::Report,
            MessageKind::SafetyAlert,
            MessageKind::StatusRequest,
            MessageKind::AuditRequest,
            MessageKind::CollaborationResponse,
        ]
    }

    async fn execute(&self, ctx: &dyn AgentContext, task: &Task) -> anyhow::Result<Value> {
        simulate(task).await?;
        let name = task.name.to_lowercase();
        if name.contains("planning") {
            return Ok(self.plan(ctx).await);
        }
        if name.contains("resource") {
            return Ok(self.allocate_resources(ctx).await);
        }
        if name.contains("progress") || name.contains("synthesis") {
            let synthesis = self.synthesize().await;
            let contributors = synthesis["agent_contributions"]
                .as_object()
                .map_or(0, serde_json::Map::len);
            return Ok(json!({
                "status": "completed",
                "progress_score": (contributors * 20).min(100),
                "synthesis": synthesis,
            }));
        }
        Ok(generic_result("Coordination", task))
    }

    async fn handle_message(
        &self,
        ctx: &dyn AgentContext,
        message: &Message,
    ) -> anyhow::Result<Option<Message>> {
        match message.kind {
            MessageKind::Report => {
                self.state
                    .write()
                    .await
                    .reports
                    .insert(message.sender, message.content.clone());
                tracing::info!(agent_id = %ctx.agent_id(), from = %message.sender, "agent report received");
                self.maybe_advance(ctx).await;
                Ok(None)
            }
            MessageKind::SafetyAlert => {
                tracing::warn!(agent_id = %ctx.agent_id(), alert = %message.content, "safety alert received");
                let outcome = ctx
                    .broadcast_to_subordinates(
                        MessageKind::SafetyAlert,
                        json!({
                            "type": "safety_alert",
                            "alert": message.content,
                            "action_required": true,
                        }),
                    )
                    .await;
                self.state.write().await.alerts_relayed += 1;
                tracing::warn!(
                    agent_id = %ctx.agent_id(),
                    relayed_to = outcome.delivered.len(),
                    "safety alert broadcast to subordinates"
                );
                Ok(None)
            }
            MessageKind::StatusRequest => Ok(Some(
                message.reply(MessageKind::StatusResponse, self.snapshot().await),
            )),
            MessageKind::AuditRequest => Ok(Some(audit_self_report(ctx, message, self.snapshot().await))),
            MessageKind::CollaborationResponse => {
                tracing::debug!(from = %message.sender, "collaboration response received");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn detail(&self) -> Value {
        self.snapshot().await
    }
}
