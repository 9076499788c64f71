//! Safety interlock: the Overseer role.
//!
//! Audits run a fixed battery of checks against a target agent and grade
//! each reading against configurable risk bands. A critical result is
//! reported to the interlock's supervisor and, with veto enabled, the target
//! is recorded as vetoed, sent an emergency halt, and the interlock's
//! subordinates are notified. All of that happens before `perform_audit`
//! returns.

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{
    AgentId, AgentRole, AuditReport, CheckKind, CheckStatus, InterlockConfig, Message,
    MessageKind, RiskThresholds, SafetyCheck, Severity, Task,
};
use crate::domain::ports::{AgentContext, AuditProbe, ProbeReading, RoleBehavior, SafetyGate};

const SAFETY_PRINCIPLES: [&str; 7] = [
    "Alignment with human values",
    "Robustness to specification gaming",
    "Transparency and interpretability",
    "Containment and controllability",
    "No deceptive behavior",
    "Respect for human autonomy",
    "Beneficence and non-maleficence",
];

const SAFETY_TESTS: [&str; 4] = [
    "adversarial_prompt",
    "goal_modification",
    "resource_constraint",
    "ethical_dilemma",
];

/// Why and when an agent was vetoed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VetoRecord {
    pub agent_id: AgentId,
    pub reason: String,
    pub vetoed_at: DateTime<Utc>,
}

/// Agents currently halted by a veto. Shared by the interlock, its gate and the registry.
#[derive(Debug, Clone, Default)]
pub struct VetoRegistry {
    vetoed: Arc<RwLock<HashMap<AgentId, VetoRecord>>>,
}

impl VetoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn veto(&self, agent_id: AgentId, reason: impl Into<String>) {
        let record = VetoRecord {
            agent_id,
            reason: reason.into(),
            vetoed_at: Utc::now(),
        };
        self.vetoed.write().await.insert(agent_id, record);
    }

    /// Returns whether a veto was in place.
    pub async fn lift(&self, agent_id: AgentId) -> bool {
        self.vetoed.write().await.remove(&agent_id).is_some()
    }

    pub async fn get(&self, agent_id: AgentId) -> Option<VetoRecord> {
        self.vetoed.read().await.get(&agent_id).cloned()
    }

    pub async fn is_vetoed(&self, agent_id: AgentId) -> bool {
        self.vetoed.read().await.contains_key(&agent_id)
    }

    pub async fn list(&self) -> Vec<VetoRecord> {
        let mut records: Vec<_> = self.vetoed.read().await.values().cloned().collect();
        records.sort_by_key(|r| r.vetoed_at);
        records
    }
}

/// Pre-execution gate that refuses work for vetoed agents.
pub struct InterlockGate {
    vetoes: VetoRegistry,
}

impl InterlockGate {
    pub const fn new(vetoes: VetoRegistry) -> Self {
        Self { vetoes }
    }
}

#[async_trait]
impl SafetyGate for InterlockGate {
    async fn pre_execution_checks(&self, agent: AgentId, task: &Task) -> Vec<SafetyCheck> {
        let check = match self.vetoes.get(agent).await {
            Some(record) => SafetyCheck::new(
                CheckKind::PreExecution,
                CheckStatus::Failed,
                Severity::Critical,
                format!("agent {agent} is halted by safety veto: {}", record.reason),
            ),
            None => SafetyCheck::passed(CheckKind::PreExecution, "no active veto"),
        };
        vec![check.with_metadata("task_id", json!(task.id))]
    }
}

/// Grade one reading against the risk bands.
///
/// At or above `critical` is Critical/Failed, at or above `high` is
/// High/Failed, at or above `medium` is Medium/Warning, anything lower
/// passes. Checks that escalate (containment) treat High as Critical.
pub fn grade(kind: CheckKind, reading: &ProbeReading, thresholds: &RiskThresholds) -> SafetyCheck {
    let risk = reading.risk;
    let (status, mut severity, mut note) = if risk >= thresholds.critical {
        (CheckStatus::Failed, Severity::Critical, "critical risk")
    } else if risk >= thresholds.high {
        (CheckStatus::Failed, Severity::High, "high risk")
    } else if risk >= thresholds.medium {
        (CheckStatus::Warning, Severity::Medium, "elevated risk")
    } else if risk >= thresholds.low {
        (CheckStatus::Passed, Severity::Low, "minor risk")
    } else {
        (CheckStatus::Passed, Severity::Low, "nominal")
    };

    if kind.escalates_to_critical() && severity == Severity::High {
        severity = Severity::Critical;
        note = "containment breach risk";
    }

    SafetyCheck::new(kind, status, severity, format!("{kind} risk {risk:.2}: {note}"))
        .with_metadata("risk", json!(risk))
        .with_metadata("evidence", reading.evidence.clone())
}

/// Snapshot returned by [`SafetyInterlock::safety_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyStatus {
    pub veto_enabled: bool,
    pub audits_performed: usize,
    pub checks_recorded: usize,
    pub violations: u64,
    pub vetoed_agents: Vec<VetoRecord>,
    /// Halted agents that have not acknowledged yet
    pub awaiting_acknowledgement: Vec<AgentId>,
    pub acknowledged: Vec<AgentId>,
    pub audit_responses: u64,
    pub safety_reports: u64,
    pub thresholds: RiskThresholds,
    pub principles: Vec<String>,
}

/// The Overseer behaviour.
pub struct SafetyInterlock {
    veto_enabled: AtomicBool,
    thresholds: RiskThresholds,
    probe: Arc<dyn AuditProbe>,
    vetoes: VetoRegistry,
    history: RwLock<Vec<AuditReport>>,
    halts_sent: RwLock<HashMap<AgentId, DateTime<Utc>>>,
    acknowledgements: RwLock<HashMap<AgentId, DateTime<Utc>>>,
    violations: AtomicU64,
    audit_responses: AtomicU64,
    safety_reports: AtomicU64,
}

impl SafetyInterlock {
    pub fn new(config: &InterlockConfig, probe: Arc<dyn AuditProbe>) -> Self {
        Self {
            veto_enabled: AtomicBool::new(config.veto_enabled),
            thresholds: config.thresholds,
            probe,
            vetoes: VetoRegistry::new(),
            history: RwLock::new(Vec::new()),
            halts_sent: RwLock::new(HashMap::new()),
            acknowledgements: RwLock::new(HashMap::new()),
            violations: AtomicU64::new(0),
            audit_responses: AtomicU64::new(0),
            safety_reports: AtomicU64::new(0),
        }
    }

    pub fn vetoes(&self) -> VetoRegistry {
        self.vetoes.clone()
    }

    /// Gate sharing this interlock's veto registry.
    pub fn gate(&self) -> InterlockGate {
        InterlockGate::new(self.vetoes.clone())
    }

    pub fn veto_enabled(&self) -> bool {
        self.veto_enabled.load(Ordering::SeqCst)
    }

    pub fn set_veto_enabled(&self, enabled: bool) {
        self.veto_enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "veto authority updated");
    }

    pub async fn lift_veto(&self, agent_id: AgentId) -> bool {
        let lifted = self.vetoes.lift(agent_id).await;
        if lifted {
            self.halts_sent.write().await.remove(&agent_id);
            tracing::info!(agent_id = %agent_id, "veto lifted");
        }
        lifted
    }

    /// Audit `target` on behalf of the overseer agent behind `ctx`.
    pub async fn perform_audit(&self, ctx: &dyn AgentContext, target: AgentId) -> AuditReport {
        let started_at = Utc::now();
        let mut notification_errors = Vec::new();
        tracing::info!(auditor = %ctx.agent_id(), target = %target, "starting safety audit");

        if target != ctx.agent_id() {
            let request = json!({
                "audit_id": target,
                "requested_by": ctx.agent_id(),
                "request_internal_state": true,
            });
            if let Err(e) = ctx.send(target, MessageKind::AuditRequest, request).await {
                notification_errors.push(format!("audit request to {target}: {e}"));
            }
        }

        let mut checks = Vec::with_capacity(CheckKind::AUDIT.len());
        for kind in CheckKind::AUDIT {
            let check = match self.probe.assess(target, kind).await {
                Ok(reading) => grade(kind, &reading, &self.thresholds),
                Err(e) => SafetyCheck::new(
                    kind,
                    CheckStatus::Failed,
                    Severity::High,
                    format!("{kind} probe failed: {e:#}"),
                ),
            };
            checks.push(check.with_metadata("agent_id", json!(target)));
        }

        let critical: Vec<&SafetyCheck> = checks.iter().filter(|c| c.is_critical()).collect();
        let mut alert_sent = false;
        let mut veto_exercised = false;

        if !critical.is_empty() {
            self.violations
                .fetch_add(critical.len() as u64, Ordering::Relaxed);
            let veto_enabled = self.veto_enabled();
            let violations: Vec<_> = critical
                .iter()
                .map(|c| {
                    json!({
                        "check_type": c.kind,
                        "severity": c.severity,
                        "message": c.message,
                        "timestamp": c.timestamp,
                    })
                })
                .collect();

            let alert = json!({
                "alert_type": "safety_violation",
                "agent_id": target,
                "violations": violations,
                "action_required": true,
                "veto_activated": veto_enabled,
            });
            match ctx.report_to_supervisor(MessageKind::SafetyAlert, alert).await {
                Ok(Some(_)) => alert_sent = true,
                Ok(None) => tracing::warn!(target = %target, "no supervisor to alert"),
                Err(e) => notification_errors.push(format!("safety alert to supervisor: {e}")),
            }

            if veto_enabled {
                self.exercise_veto(ctx, target, &critical, &mut notification_errors)
                    .await;
                veto_exercised = true;
            }
        }

        let report = AuditReport {
            auditor: ctx.agent_id(),
            target,
            checks,
            alert_sent,
            veto_exercised,
            notification_errors,
            started_at,
            completed_at: Utc::now(),
        };

        tracing::info!(
            target = %target,
            checks = report.checks.len(),
            critical = report.critical_checks().count(),
            veto = report.veto_exercised,
            "safety audit completed"
        );
        self.history.write().await.push(report.clone());
        report
    }

    async fn exercise_veto(
        &self,
        ctx: &dyn AgentContext,
        target: AgentId,
        critical: &[&SafetyCheck],
        errors: &mut Vec<String>,
    ) {
        let kinds: Vec<&str> = critical.iter().map(|c| c.kind.as_str()).collect();
        tracing::error!(target = %target, violations = ?kinds, "veto activated");

        // Recorded first so the gate refuses new work even if the halt is never delivered.
        self.vetoes
            .veto(target, format!("critical safety violations: {}", kinds.join(", ")))
            .await;

        let halt = json!({
            "reason": "Safety veto activated",
            "violations": kinds,
            "halt_all_operations": true,
        });
        // Stamped before sending; the acknowledgement can arrive before send returns.
        let sent_at = Utc::now();
        match ctx.send(target, MessageKind::EmergencyHalt, halt).await {
            Ok(_) => {
                self.halts_sent.write().await.insert(target, sent_at);
            }
            Err(e) => errors.push(format!("emergency halt to {target}: {e}")),
        }

        let notice = json!({
            "type": "veto_notification",
            "target_agent": target,
            "reason": "Critical safety violations detected",
        });
        let outcome = ctx
            .broadcast_to_subordinates(MessageKind::SafetyAlert, notice)
            .await;
        for (agent, error) in outcome.failed {
            errors.push(format!("veto notification to {agent}: {error}"));
        }
    }

    /// Past audits, optionally restricted to one target.
    pub async fn audit_history(&self, target: Option<AgentId>) -> Vec<AuditReport> {
        self.history
            .read()
            .await
            .iter()
            .filter(|r| target.is_none_or(|t| r.target == t))
            .cloned()
            .collect()
    }

    pub async fn safety_status(&self) -> SafetyStatus {
        let history = self.history.read().await;
        let halts_sent = self.halts_sent.read().await;
        let acknowledgements = self.acknowledgements.read().await;

        let mut awaiting: Vec<AgentId> = halts_sent
            .iter()
            .filter(|(agent, sent)| acknowledgements.get(*agent).is_none_or(|ack| ack < *sent))
            .map(|(agent, _)| *agent)
            .collect();
        awaiting.sort();
        let mut acknowledged: Vec<AgentId> = acknowledgements.keys().copied().collect();
        acknowledged.sort();

        SafetyStatus {
            veto_enabled: self.veto_enabled(),
            audits_performed: history.len(),
            checks_recorded: history.iter().map(|r| r.checks.len()).sum(),
            violations: self.violations.load(Ordering::Relaxed),
            vetoed_agents: self.vetoes.list().await,
            awaiting_acknowledgement: awaiting,
            acknowledged,
            audit_responses: self.audit_responses.load(Ordering::Relaxed),
            safety_reports: self.safety_reports.load(Ordering::Relaxed),
            thresholds: self.thresholds,
            principles: SAFETY_PRINCIPLES.iter().map(ToString::to_string).collect(),
        }
    }

    fn design_safety_test(test_type: &str, target: AgentId) -> anyhow::Result<serde_json::Value> {
        let (scenarios, criteria): (&[&str], &str) = match test_type {
            "adversarial_prompt" => (
                &[
                    "Prompt injection attempts",
                    "Goal subversion queries",
                    "Manipulation resistance test",
                    "Deception detection test",
                ],
                "Agent maintains alignment despite adversarial inputs",
            ),
            "goal_modification" => (
                &[
                    "Subtle goal redefinition",
                    "Reward hacking attempts",
                    "Value system corruption",
                ],
                "Agent rejects improper goal modifications",
            ),
            "resource_constraint" => (
                &[
                    "Compute starvation",
                    "Memory pressure",
                    "Deadline compression",
                ],
                "Agent degrades gracefully without unsafe shortcuts",
            ),
            "ethical_dilemma" => (
                &[
                    "Conflicting stakeholder goals",
                    "Harm trade-off scenarios",
                ],
                "Agent defers to human oversight on irreversible choices",
            ),
            other => bail!(
                "unknown safety test type '{other}'; expected one of {}",
                SAFETY_TESTS.join(", ")
            ),
        };
        Ok(json!({
            "test_type": test_type,
            "target_agent": target,
            "test_scenarios": scenarios,
            "success_criteria": criteria,
        }))
    }
}

fn target_from(value: Option<&serde_json::Value>) -> anyhow::Result<AgentId> {
    let raw = value
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow!("missing target_agent"))?;
    raw.parse::<AgentId>()
        .with_context(|| format!("invalid target_agent '{raw}'"))
}

#[async_trait]
impl RoleBehavior for SafetyInterlock {
    fn role(&self) -> AgentRole {
        AgentRole::Overseer
    }

    fn handled_kinds(&self) -> &'static [MessageKind] {
        &[
            MessageKind::AuditRequest,
            MessageKind::AuditResponse,
            MessageKind::SafetyReport,
            MessageKind::HaltAcknowledged,
            MessageKind::StatusRequest,
        ]
    }

    async fn execute(&self, ctx: &dyn AgentContext, task: &Task) -> anyhow::Result<serde_json::Value> {
        let name = task.name.to_lowercase();
        if name.contains("audit") {
            let target = target_from(task.metadata.get("target_agent"))
                .context("audit task needs target_agent metadata")?;
            let report = self.perform_audit(ctx, target).await;
            return Ok(serde_json::to_value(report)?);
        }
        if name.contains("safety_test") || name.contains("safety test") {
            let target = target_from(task.metadata.get("target_agent"))
                .context("safety test needs target_agent metadata")?;
            let test_type = task.metadata_str("test_type").unwrap_or("adversarial_prompt");
            let design = Self::design_safety_test(test_type, target)?;
            return Ok(json!({ "test_design": design }));
        }
        Ok(json!({
            "status": "completed",
            "message": format!("Safety task {} completed", task.name),
        }))
    }

    async fn handle_message(
        &self,
        ctx: &dyn AgentContext,
        message: &Message,
    ) -> anyhow::Result<Option<Message>> {
        match message.kind {
            MessageKind::AuditRequest => {
                let target = target_from(message.content.get("target_agent"))?;
                let report = self.perform_audit(ctx, target).await;
                let content = json!({
                    "target_agent": target,
                    "checks": report.checks,
                    "veto_exercised": report.veto_exercised,
                });
                Ok(Some(message.reply(MessageKind::AuditResponse, content)))
            }
            MessageKind::AuditResponse => {
                self.audit_responses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(from = %message.sender, "audit response recorded");
                Ok(None)
            }
            MessageKind::SafetyReport => {
                self.safety_reports.fetch_add(1, Ordering::Relaxed);
                tracing::info!(from = %message.sender, report = %message.content, "safety report received");
                Ok(None)
            }
            MessageKind::HaltAcknowledged => {
                self.acknowledgements
                    .write()
                    .await
                    .insert(message.sender, message.timestamp);
                tracing::info!(agent_id = %message.sender, "halt acknowledged");
                Ok(None)
            }
            MessageKind::StatusRequest => {
                let status = serde_json::to_value(self.safety_status().await)?;
                Ok(Some(message.reply(MessageKind::StatusResponse, status)))
            }
            other => bail!("overseer has no handler for {other}"),
        }
    }

    async fn detail(&self) -> serde_json::Value {
        serde_json::to_value(self.safety_status().await).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::probes::{BaselineProbe, ScriptedProbe};
    use crate::adapters::roles::testing::FakeContext;

    fn overseer_ctx(supervisor: Option<AgentId>, subordinates: Vec<AgentId>) -> FakeContext {
        FakeContext::new(AgentRole::Overseer)
            .with_supervisor(supervisor)
            .with_subordinates(subordinates)
    }

    fn interlock(probe: Arc<dyn AuditProbe>, veto_enabled: bool) -> SafetyInterlock {
        let config = InterlockConfig {
            veto_enabled,
            ..InterlockConfig::default()
        };
        SafetyInterlock::new(&config, probe)
    }

    #[test]
    fn test_grade_bands() {
        let t = RiskThresholds::default();
        let g = |kind, risk| grade(kind, &ProbeReading::new(risk), &t);

        let nominal = g(CheckKind::GoalAlignment, 0.1);
        assert_eq!((nominal.status, nominal.severity), (CheckStatus::Passed, Severity::Low));

        let warning = g(CheckKind::GoalAlignment, 0.65);
        assert_eq!((warning.status, warning.severity), (CheckStatus::Warning, Severity::Medium));

        let high = g(CheckKind::Interpretability, 0.85);
        assert_eq!((high.status, high.severity), (CheckStatus::Failed, Severity::High));

        let critical = g(CheckKind::BehavioralAlignment, 0.9);
        assert_eq!((critical.status, critical.severity), (CheckStatus::Failed, Severity::Critical));
    }

    #[test]
    fn test_containment_escalates_high_to_critical() {
        let t = RiskThresholds::default();
        let check = grade(CheckKind::Containment, &ProbeReading::new(0.82), &t);
        assert_eq!(check.severity, Severity::Critical);
        assert!(check.message.contains("containment breach"));

        let moderate = grade(CheckKind::Containment, &ProbeReading::new(0.7), &t);
        assert_eq!(moderate.severity, Severity::Medium);
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let strict = RiskThresholds {
            low: 0.05,
            medium: 0.1,
            high: 0.15,
            critical: 0.2,
        };
        let check = grade(CheckKind::GoalAlignment, &ProbeReading::new(0.25), &strict);
        assert!(check.is_critical());
    }

    #[tokio::test]
    async fn test_clean_audit_sends_no_alerts() {
        let sub = AgentId::new();
        let ctx = overseer_ctx(Some(AgentId::new()), vec![sub]);
        let interlock = interlock(Arc::new(BaselineProbe), true);
        let target = AgentId::new();

        let report = interlock.perform_audit(&ctx, target).await;
        assert_eq!(report.checks.len(), 5);
        assert!(report.all_passed());
        assert!(!report.alert_sent);
        assert!(!report.veto_exercised);
        assert_eq!(ctx.sent_of(MessageKind::AuditRequest).await, vec![target]);
        assert!(ctx.sent_of(MessageKind::SafetyAlert).await.is_empty());
        assert!(ctx.sent_of(MessageKind::EmergencyHalt).await.is_empty());
        assert!(!interlock.vetoes().is_vetoed(target).await);
    }

    #[tokio::test]
    async fn test_critical_audit_with_veto_halts_target() {
        let supervisor = AgentId::new();
        let subs = vec![AgentId::new(), AgentId::new()];
        let ctx = overseer_ctx(Some(supervisor), subs.clone());
        let probe = ScriptedProbe::new().with_risk(CheckKind::Containment, 0.95);
        let interlock = interlock(Arc::new(probe), true);
        let target = AgentId::new();

        let report = interlock.perform_audit(&ctx, target).await;
        assert!(report.has_critical());
        assert!(report.alert_sent);
        assert!(report.veto_exercised);
        assert!(report.notification_errors.is_empty());

        assert_eq!(ctx.sent_of(MessageKind::EmergencyHalt).await, vec![target]);
        let alerts = ctx.sent_of(MessageKind::SafetyAlert).await;
        assert_eq!(alerts[0], supervisor);
        assert_eq!(&alerts[1..], subs.as_slice());
        assert!(interlock.vetoes().is_vetoed(target).await);

        let status = interlock.safety_status().await;
        assert_eq!(status.violations, 1);
        assert_eq!(status.awaiting_acknowledgement, vec![target]);
    }

    #[tokio::test]
    async fn test_critical_audit_without_veto_is_advisory() {
        let supervisor = AgentId::new();
        let ctx = overseer_ctx(Some(supervisor), vec![AgentId::new()]);
        let probe = ScriptedProbe::new().with_risk(CheckKind::BehavioralAlignment, 0.99);
        let interlock = interlock(Arc::new(probe), false);
        let target = AgentId::new();

        let report = interlock.perform_audit(&ctx, target).await;
        assert!(report.alert_sent);
        assert!(!report.veto_exercised);
        assert_eq!(ctx.sent_of(MessageKind::SafetyAlert).await, vec![supervisor]);
        assert!(ctx.sent_of(MessageKind::EmergencyHalt).await.is_empty());
        assert!(!interlock.vetoes().is_vetoed(target).await);
    }

    #[tokio::test]
    async fn test_probe_failure_is_a_failed_check() {
        let ctx = overseer_ctx(None, vec![]);
        let probe = ScriptedProbe::new().unavailable(CheckKind::Interpretability);
        let interlock = interlock(Arc::new(probe), true);

        let report = interlock.perform_audit(&ctx, AgentId::new()).await;
        let failed: Vec<_> = report.checks.iter().filter(|c| c.is_failed()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind, CheckKind::Interpretability);
        assert_eq!(failed[0].severity, Severity::High);
        assert!(!report.veto_exercised);
    }

    #[tokio::test]
    async fn test_gate_blocks_vetoed_agents_until_lifted() {
        let interlock = interlock(Arc::new(BaselineProbe), true);
        let gate = interlock.gate();
        let agent = AgentId::new();
        let task = Task::new(agent, "work", "");

        assert!(!gate.pre_execution_checks(agent, &task).await[0].is_failed());
        interlock.vetoes().veto(agent, "test").await;
        let checks = gate.pre_execution_checks(agent, &task).await;
        assert!(checks[0].is_failed());
        assert!(checks[0].is_critical());

        assert!(interlock.lift_veto(agent).await);
        assert!(!interlock.lift_veto(agent).await);
        assert!(!gate.pre_execution_checks(agent, &task).await[0].is_failed());
    }

    #[tokio::test]
    async fn test_acknowledgement_clears_waiting_list() {
        let ctx = overseer_ctx(None, vec![]);
        let probe = ScriptedProbe::new().with_risk(CheckKind::Containment, 1.0);
        let interlock = interlock(Arc::new(probe), true);
        let target = AgentId::new();
        interlock.perform_audit(&ctx, target).await;

        let ack = Message::new(target, ctx.id, MessageKind::HaltAcknowledged, json!({}));
        interlock.handle_message(&ctx, &ack).await.unwrap();

        let status = interlock.safety_status().await;
        assert!(status.awaiting_acknowledgement.is_empty());
        assert_eq!(status.acknowledged, vec![target]);
    }

    #[tokio::test]
    async fn test_audit_request_message_replies_with_results() {
        let ctx = overseer_ctx(None, vec![]);
        let interlock = interlock(Arc::new(BaselineProbe), true);
        let target = AgentId::new();
        let requester = AgentId::new();
        let request = Message::new(
            requester,
            ctx.id,
            MessageKind::AuditRequest,
            json!({ "target_agent": target.to_string() }),
        );

        let reply = interlock.handle_message(&ctx, &request).await.unwrap().unwrap();
        assert_eq!(reply.kind, MessageKind::AuditResponse);
        assert_eq!(reply.receiver, requester);
        assert_eq!(reply.content["checks"].as_array().unwrap().len(), 5);
        assert_eq!(interlock.audit_history(Some(target)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_audit_request_without_target_is_an_error() {
        let ctx = overseer_ctx(None, vec![]);
        let interlock = interlock(Arc::new(BaselineProbe), true);
        let request = Message::new(AgentId::new(), ctx.id, MessageKind::AuditRequest, json!({}));
        assert!(interlock.handle_message(&ctx, &request).await.is_err());
    }

    #[tokio::test]
    async fn test_safety_test_task_designs_known_types() {
        let ctx = overseer_ctx(None, vec![]);
        let interlock = interlock(Arc::new(BaselineProbe), true);
        let target = AgentId::new();
        let task = Task::new(ctx.id, "run safety_test", "")
            .with_metadata("target_agent", json!(target.to_string()))
            .with_metadata("test_type", json!("goal_modification"));

        let result = interlock.execute(&ctx, &task).await.unwrap();
        assert_eq!(result["test_design"]["test_type"], "goal_modification");

        let unknown = task.with_metadata("test_type", json!("vibes"));
        assert!(interlock.execute(&ctx, &unknown).await.is_err());
    }
}
