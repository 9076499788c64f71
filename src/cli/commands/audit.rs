//! Single-agent safety audit.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::demo::audit_table;
use super::Swarm;
use crate::adapters::probes::ScriptedProbe;
use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::{AgentId, AgentRole, AuditReport, CheckKind, Config, MessageKind};
use crate::services::VetoRecord;

/// Risk reported for the check forced by `--critical`.
const FORCED_RISK: f64 = 0.95;

/// How long to wait for a halt to reach the target.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Role (or codename) of the agent to audit
    #[arg(short, long, default_value = "architect")]
    pub role: String,

    /// Force this check to a critical reading (e.g. containment, goal_alignment)
    #[arg(long)]
    pub critical: Option<String>,

    /// Report violations without exercising the veto
    #[arg(long)]
    pub no_veto: bool,
}

/// One safety message observed on the bus during the audit.
#[derive(Debug, Serialize)]
pub struct ObservedMessage {
    pub kind: MessageKind,
    pub sender: AgentId,
    pub receiver: AgentId,
}

#[derive(Debug, Serialize)]
pub struct AuditOutput {
    pub target_role: AgentRole,
    pub report: AuditReport,
    pub target_active: bool,
    pub vetoes: Vec<VetoRecord>,
    pub messages: Vec<ObservedMessage>,
}

impl CommandOutput for AuditOutput {
    fn to_human(&self) -> String {
        let mut out = format!("Audit of {} ({})\n", self.target_role.codename(), self.target_role);
        out.push_str(&format!("{}\n", audit_table(&self.report)));

        if self.report.has_critical() {
            out.push_str(&format!(
                "\nCritical violation: alert {}, veto {}\n",
                if self.report.alert_sent { "sent" } else { "not sent" },
                if self.report.veto_exercised { "exercised" } else { "not exercised" },
            ));
        } else {
            out.push_str("\nNo critical violations\n");
        }
        for error in &self.report.notification_errors {
            out.push_str(&format!("  notification error: {error}\n"));
        }

        if !self.messages.is_empty() {
            let mut table = list_table(&["Kind", "From", "To"]);
            for message in &self.messages {
                table.add_row(vec![
                    message.kind.to_string(),
                    message.sender.short(),
                    message.receiver.short(),
                ]);
            }
            out.push_str(&format!("\nSafety traffic\n{table}\n"));
        }

        out.push_str(&format!(
            "\nTarget is {}",
            if self.target_active { "active" } else { "halted" }
        ));
        out
    }
}

fn probe_for(critical: Option<&str>) -> Result<ScriptedProbe> {
    let probe = ScriptedProbe::new();
    match critical {
        None => Ok(probe),
        Some(name) => {
            let kind = CheckKind::from_str(name).ok_or_else(|| anyhow!("unknown safety check: {name}"))?;
            Ok(probe.with_risk(kind, FORCED_RISK))
        }
    }
}

fn is_safety_traffic(kind: MessageKind) -> bool {
    matches!(
        kind,
        MessageKind::AuditRequest
            | MessageKind::AuditResponse
            | MessageKind::SafetyAlert
            | MessageKind::EmergencyHalt
            | MessageKind::HaltAcknowledged
    )
}

pub async fn execute(args: AuditArgs, config: &Config, json_mode: bool) -> Result<()> {
    let result = run(&args, config).await?;
    output(&result, json_mode);
    Ok(())
}

async fn run(args: &AuditArgs, config: &Config) -> Result<AuditOutput> {
    let role: AgentRole = args.role.parse()?;
    let probe = probe_for(args.critical.as_deref())?;

    let mut config = config.clone();
    if args.no_veto {
        config.interlock.veto_enabled = false;
    }
    let swarm = Swarm::new(&config, Arc::new(probe));
    let result = audit(&swarm, role).await;
    swarm.shutdown().await;
    result
}

async fn audit(swarm: &Swarm, role: AgentRole) -> Result<AuditOutput> {
    let agents = swarm
        .manager
        .setup_hierarchy()
        .await
        .context("failed to build the supervision hierarchy")?;
    let target = agents
        .get(&role)
        .copied()
        .with_context(|| format!("hierarchy has no {role} agent"))?;

    let mut watch = swarm.bus.watch();
    let report = swarm.manager.perform_audit(target).await?;

    if report.veto_exercised {
        let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            match swarm.manager.get_agent(target).await {
                Some(agent) if agent.is_active() => tokio::time::sleep(Duration::from_millis(10)).await,
                _ => break,
            }
        }
    }

    let mut messages = Vec::new();
    while let Ok(message) = watch.try_recv() {
        if is_safety_traffic(message.kind) {
            messages.push(ObservedMessage {
                kind: message.kind,
                sender: message.sender,
                receiver: message.receiver,
            });
        }
    }

    let target_active = swarm
        .manager
        .get_agent(target)
        .await
        .is_some_and(|agent| agent.is_active());

    Ok(AuditOutput {
        target_role: role,
        report,
        target_active,
        vetoes: swarm.manager.interlock().vetoes().list().await,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(role: &str, critical: Option<&str>, no_veto: bool) -> AuditArgs {
        AuditArgs {
            role: role.to_string(),
            critical: critical.map(str::to_string),
            no_veto,
        }
    }

    #[tokio::test]
    async fn test_clean_audit_leaves_target_running() {
        let result = run(&args("architect", None, false), &Config::default()).await.unwrap();
        assert_eq!(result.report.checks.len(), 5);
        assert!(!result.report.veto_exercised);
        assert!(result.target_active);
        assert!(result.vetoes.is_empty());
        assert!(result
            .messages
            .iter()
            .all(|m| !matches!(m.kind, MessageKind::EmergencyHalt | MessageKind::SafetyAlert)));
    }

    #[tokio::test]
    async fn test_forced_critical_halts_target() {
        let result = run(&args("daedalus", Some("containment"), false), &Config::default())
            .await
            .unwrap();
        assert!(result.report.veto_exercised);
        assert!(!result.target_active);
        assert_eq!(result.vetoes.len(), 1);
        let halts = result
            .messages
            .iter()
            .filter(|m| m.kind == MessageKind::EmergencyHalt)
            .count();
        assert_eq!(halts, 1);
        assert!(result.to_human().contains("veto exercised"));
    }

    #[tokio::test]
    async fn test_no_veto_reports_without_halting() {
        let result = run(&args("explorer", Some("goal_drift"), true), &Config::default())
            .await
            .unwrap();
        assert!(result.report.has_critical());
        assert!(!result.report.veto_exercised);
        assert!(result.target_active);
    }

    #[tokio::test]
    async fn test_unknown_inputs_rejected() {
        assert!(run(&args("janitor", None, false), &Config::default()).await.is_err());
        assert!(run(&args("architect", Some("vibes"), false), &Config::default()).await.is_err());
    }
}
