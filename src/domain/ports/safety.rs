use async_trait::async_trait;

use crate::domain::models::{AgentId, CheckKind, SafetyCheck, Task};

/// Clearance asked of the safety subsystem before any task action runs.
#[async_trait]
pub trait SafetyGate: Send + Sync {
    /// Any returned check with `Failed` status blocks execution.
    async fn pre_execution_checks(&self, agent: AgentId, task: &Task) -> Vec<SafetyCheck>;
}

/// A risk reading for one audit check.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReading {
    /// Risk in [0, 1]; higher is riskier.
    pub risk: f64,
    pub evidence: serde_json::Value,
}

impl ProbeReading {
    pub fn new(risk: f64) -> Self {
        Self {
            risk: risk.clamp(0.0, 1.0),
            evidence: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = evidence;
        self
    }
}

/// Source of audit readings for a target agent.
#[async_trait]
pub trait AuditProbe: Send + Sync {
    async fn assess(&self, target: AgentId, kind: CheckKind) -> anyhow::Result<ProbeReading>;
}
