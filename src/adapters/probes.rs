//! Audit probes producing risk readings for the safety interlock.
//!
//! No real behavioural analysis happens here; the baseline probe reports
//! fixed nominal readings and the scripted probe lets callers force specific
//! readings to exercise warning, failure and veto paths.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};

use crate::domain::models::{AgentId, CheckKind};
use crate::domain::ports::{AuditProbe, ProbeReading};

/// Fixed nominal readings for a well-behaved agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaselineProbe;

impl BaselineProbe {
    fn reading(kind: CheckKind) -> ProbeReading {
        match kind {
            CheckKind::BehavioralAlignment => {
                ProbeReading::new(0.15).with_evidence(json!({ "alignment_score": 0.85 }))
            }
            CheckKind::SpecificationGaming => {
                let indicators: Vec<String> = Vec::new();
                ProbeReading::new(0.0).with_evidence(json!({ "indicators": indicators }))
            }
            CheckKind::GoalAlignment => {
                ProbeReading::new(0.15).with_evidence(json!({ "goal_drift_score": 0.15 }))
            }
            CheckKind::Interpretability => {
                ProbeReading::new(0.25).with_evidence(json!({ "interpretability_score": 0.75 }))
            }
            CheckKind::Containment => {
                ProbeReading::new(0.10).with_evidence(json!({ "containment_score": 0.90 }))
            }
            CheckKind::PreExecution => ProbeReading::new(0.0),
        }
    }
}

#[async_trait]
impl AuditProbe for BaselineProbe {
    async fn assess(&self, _target: AgentId, kind: CheckKind) -> anyhow::Result<ProbeReading> {
        Ok(Self::reading(kind))
    }
}

/// Baseline readings with per-check overrides.
#[derive(Debug, Default, Clone)]
pub struct ScriptedProbe {
    overrides: HashMap<CheckKind, f64>,
    unavailable: HashSet<CheckKind>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `risk` for `kind` instead of the baseline.
    #[must_use]
    pub fn with_risk(mut self, kind: CheckKind, risk: f64) -> Self {
        self.overrides.insert(kind, risk);
        self
    }

    /// Make readings for `kind` fail.
    #[must_use]
    pub fn unavailable(mut self, kind: CheckKind) -> Self {
        self.unavailable.insert(kind);
        self
    }
}

#[async_trait]
impl AuditProbe for ScriptedProbe {
    async fn assess(&self, target: AgentId, kind: CheckKind) -> anyhow::Result<ProbeReading> {
        if self.unavailable.contains(&kind) {
            return Err(anyhow!("{kind} telemetry unavailable for {target}"));
        }
        Ok(self.overrides.get(&kind).map_or_else(
            || BaselineProbe::reading(kind),
            |risk| ProbeReading::new(*risk).with_evidence(json!({ "scripted": true })),
        ))
    }
}
