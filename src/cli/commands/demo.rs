//! End-to-end walkthrough of the swarm.

use anyhow::{Context, Result};
use comfy_table::Table;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::Swarm;
use crate::adapters::probes::BaselineProbe;
use crate::cli::output::{list_table, output, render_hierarchy, truncate, CommandOutput};
use crate::domain::models::{AgentRole, AuditReport, Config, MessageKind, Task, TaskPriority};
use crate::services::{BusStatsSnapshot, HierarchyNode, SystemStatus, TaskStatistics};

#[derive(Debug, Serialize)]
pub struct DemoOutput {
    pub hierarchy: Vec<HierarchyNode>,
    pub tasks: Vec<Task>,
    pub directive_recipients: usize,
    pub audit: AuditReport,
    pub status: SystemStatus,
    pub statistics: TaskStatistics,
    pub bus: BusStatsSnapshot,
}

impl CommandOutput for DemoOutput {
    fn to_human(&self) -> String {
        let mut out = String::from("Supervision tree\n");
        out.push_str(&render_hierarchy(&self.hierarchy));

        out.push_str("\nTasks\n");
        let mut table = list_table(&["Name", "Agent", "Priority", "Status", "Error"]);
        for task in &self.tasks {
            table.add_row(vec![
                truncate(&task.name, 40),
                task.agent_id.short(),
                task.priority.to_string(),
                task.status.to_string(),
                truncate(task.error.as_deref().unwrap_or("-"), 40),
            ]);
        }
        out.push_str(&format!("{table}\n"));

        out.push_str(&format!(
            "\nDirective delivered to {} subordinates\n",
            self.directive_recipients
        ));

        out.push_str("\nAudit of the architect\n");
        out.push_str(&format!("{}\n", audit_table(&self.audit)));

        out.push_str("\nAgents\n");
        let mut agents = list_table(&["Name", "Role", "Active", "Handled", "Done", "Failed"]);
        for agent in &self.status.agents {
            agents.add_row(vec![
                agent.name.clone(),
                agent.role.to_string(),
                agent.is_active.to_string(),
                agent.counters.messages_handled.to_string(),
                agent.counters.tasks_completed.to_string(),
                agent.counters.tasks_failed.to_string(),
            ]);
        }
        out.push_str(&format!("{agents}\n"));

        out.push_str(&format!(
            "\nTasks: {} total, {:.0}% completed, {:.0}% failed\n",
            self.statistics.total,
            self.statistics.completion_rate * 100.0,
            self.statistics.failure_rate * 100.0
        ));
        let safety = &self.status.safety;
        out.push_str(&format!(
            "Safety: veto {}, {} audits, {} violations, {} vetoed\n",
            if safety.veto_enabled { "enabled" } else { "disabled" },
            safety.audits_performed,
            safety.violations,
            safety.vetoed_agents.len()
        ));
        out.push_str(&format!(
            "Bus: {} published, {} delivered, {} dropped, {} rejected",
            self.bus.published, self.bus.delivered, self.bus.dropped, self.bus.rejected
        ));
        out
    }
}

/// Table of the checks in one audit report.
pub(crate) fn audit_table(report: &AuditReport) -> Table {
    let mut table = list_table(&["Check", "Status", "Severity", "Message"]);
    for check in &report.checks {
        table.add_row(vec![
            check.kind.to_string(),
            check.status.to_string(),
            check.severity.to_string(),
            truncate(&check.message, 60),
        ]);
    }
    table
}

const SPECIALIST_TASKS: [(AgentRole, &str, TaskPriority); 4] = [
    (AgentRole::Architect, "Design Hybrid Neuro-Symbolic Core", TaskPriority::Critical),
    (AgentRole::Reasoner, "Develop Formal Logic Systems", TaskPriority::High),
    (AgentRole::Explorer, "Design Simulation Environment", TaskPriority::High),
    (AgentRole::Overseer, "Comprehensive Safety Audit", TaskPriority::Critical),
];

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let swarm = Swarm::new(config, Arc::new(BaselineProbe));
    let result = run(&swarm).await;
    swarm.shutdown().await;
    output(&result?, json_mode);
    Ok(())
}

async fn run(swarm: &Swarm) -> Result<DemoOutput> {
    let agents = swarm
        .manager
        .setup_hierarchy()
        .await
        .context("failed to build the supervision hierarchy")?;
    let role_id = |role: AgentRole| {
        agents
            .get(&role)
            .copied()
            .with_context(|| format!("hierarchy has no {role} agent"))
    };
    let architect = role_id(AgentRole::Architect)?;

    let mut tasks = Vec::with_capacity(SPECIALIST_TASKS.len());
    for (role, name, priority) in SPECIALIST_TASKS {
        let mut metadata = HashMap::new();
        if role == AgentRole::Overseer {
            metadata.insert("target_agent".to_string(), json!(architect));
        }
        let task = swarm
            .tasks
            .create_task(role_id(role)?, name, &format!("{name} for the research programme"), priority, metadata)
            .await?;
        tasks.push(task);
    }

    let mut executed = Vec::with_capacity(tasks.len());
    for task in tasks {
        let done = swarm
            .tasks
            .execute_task(task.id)
            .await
            .with_context(|| format!("failed to dispatch {}", task.name))?;
        tracing::info!(task_id = %done.id, status = %done.status, "demo task finished");
        executed.push(done);
    }

    let directive = swarm
        .manager
        .broadcast_to_subordinates(
            role_id(AgentRole::Coordinator)?,
            MessageKind::Directive,
            json!({
                "type": "research_directive",
                "directive": "Begin hybrid architecture integration",
                "priority": "high",
            }),
        )
        .await?;

    let audit = swarm.manager.perform_audit(architect).await?;

    Ok(DemoOutput {
        hierarchy: swarm.manager.hierarchy_structure().await,
        tasks: executed,
        directive_recipients: directive.delivered.len(),
        audit,
        status: swarm.manager.system_status().await,
        statistics: swarm.tasks.statistics().await?,
        bus: swarm.bus.stats(),
    })
}
