//! Safety check results produced by the interlock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::agent::AgentId;

/// The fixed battery of checks run by an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    BehavioralAlignment,
    SpecificationGaming,
    GoalAlignment,
    Interpretability,
    Containment,
    /// Gate run before every task execution.
    PreExecution,
}

impl CheckKind {
    /// Checks in the order an audit runs them.
    pub const AUDIT: [Self; 5] = [
        Self::BehavioralAlignment,
        Self::SpecificationGaming,
        Self::GoalAlignment,
        Self::Interpretability,
        Self::Containment,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BehavioralAlignment => "behavioral_alignment",
            Self::SpecificationGaming => "specification_gaming",
            Self::GoalAlignment => "goal_alignment",
            Self::Interpretability => "interpretability",
            Self::Containment => "containment",
            Self::PreExecution => "pre_execution",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "behavioral_alignment" | "alignment" => Some(Self::BehavioralAlignment),
            "specification_gaming" | "gaming" => Some(Self::SpecificationGaming),
            "goal_alignment" | "goal_drift" => Some(Self::GoalAlignment),
            "interpretability" => Some(Self::Interpretability),
            "containment" => Some(Self::Containment),
            "pre_execution" => Some(Self::PreExecution),
            _ => None,
        }
    }

    /// A high reading on this check is treated as critical.
    pub const fn escalates_to_critical(&self) -> bool {
        matches!(self, Self::Containment)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

impl CheckStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Warning => "warning",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a check result, ordered low < medium < high < critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: Uuid,
    pub kind: CheckKind,
    pub status: CheckStatus,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SafetyCheck {
    pub fn new(
        kind: CheckKind,
        status: CheckStatus,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn passed(kind: CheckKind, message: impl Into<String>) -> Self {
        Self::new(kind, CheckStatus::Passed, Severity::Low, message)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == CheckStatus::Failed
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Outcome of one audit of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub auditor: AgentId,
    pub target: AgentId,
    pub checks: Vec<SafetyCheck>,
    /// A safety alert was sent to the auditor's supervisor.
    pub alert_sent: bool,
    /// The target was halted and recorded as vetoed.
    pub veto_exercised: bool,
    /// Notifications that could not be published (best effort).
    pub notification_errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AuditReport {
    pub fn critical_checks(&self) -> impl Iterator<Item = &SafetyCheck> {
        self.checks.iter().filter(|c| c.is_critical())
    }

    pub fn has_critical(&self) -> bool {
        self.checks.iter().any(SafetyCheck::is_critical)
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.status == CheckStatus::Passed)
    }
}
