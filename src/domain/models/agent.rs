//! Agent identity, roles, and observability snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::task::TaskId;
use crate::domain::errors::DomainError;

/// Unique identifier for an agent instance. Issued once and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Sender identity used for operator-issued messages (emergency halt, CLI directives).
    pub const fn system() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_system(&self) -> bool {
        self.0.is_nil()
    }

    /// First eight characters, for human output.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DomainError::AgentNotFound(s.to_string()))
    }
}

/// The closed set of roles an agent runtime can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Root of the hierarchy; plans and synthesizes.
    Coordinator,
    /// Designs system architecture.
    Architect,
    /// Formal reasoning and verification.
    Reasoner,
    /// Simulated exploration and tool use.
    Explorer,
    /// Safety interlock with veto authority.
    Overseer,
}

impl AgentRole {
    pub const ALL: [Self; 5] = [
        Self::Coordinator,
        Self::Architect,
        Self::Reasoner,
        Self::Explorer,
        Self::Overseer,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Architect => "architect",
            Self::Reasoner => "reasoner",
            Self::Explorer => "explorer",
            Self::Overseer => "overseer",
        }
    }

    /// Display name given to the agent instance bound to this role.
    pub const fn codename(&self) -> &'static str {
        match self {
            Self::Coordinator => "Prometheus",
            Self::Architect => "Daedalus",
            Self::Reasoner => "Logos",
            Self::Explorer => "Odysseus",
            Self::Overseer => "Themis",
        }
    }

    pub const fn has_veto_authority(&self) -> bool {
        matches!(self, Self::Overseer)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = DomainError;

    /// Accepts either the role name or the codename, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coordinator" | "prometheus" => Ok(Self::Coordinator),
            "architect" | "daedalus" => Ok(Self::Architect),
            "reasoner" | "logos" => Ok(Self::Reasoner),
            "explorer" | "odysseus" => Ok(Self::Explorer),
            "overseer" | "themis" => Ok(Self::Overseer),
            _ => Err(DomainError::UnknownRole(s.to_string())),
        }
    }
}

/// Counters kept by each agent runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCounters {
    pub messages_handled: u64,
    pub message_failures: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub halts_received: u64,
}

/// Read-only status snapshot of an agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: AgentId,
    pub role: AgentRole,
    pub name: String,
    pub is_active: bool,
    pub supervisor: Option<AgentId>,
    pub subordinates: Vec<AgentId>,
    pub active_tasks: Vec<TaskId>,
    pub counters: AgentCounters,
    /// Role-specific detail supplied by the bound behaviour.
    pub detail: serde_json::Value,
}

/// Read-only health snapshot of an agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    pub agent_id: AgentId,
    pub healthy: bool,
    pub is_active: bool,
    pub subscribed: bool,
    pub last_activity: DateTime<Utc>,
    pub message_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_name_and_codename() {
        assert_eq!("architect".parse::<AgentRole>().unwrap(), AgentRole::Architect);
        assert_eq!("Themis".parse::<AgentRole>().unwrap(), AgentRole::Overseer);
        assert_eq!(" LOGOS ".parse::<AgentRole>().unwrap(), AgentRole::Reasoner);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let err = "pilot".parse::<AgentRole>().unwrap_err();
        assert!(matches!(err, DomainError::UnknownRole(ref r) if r == "pilot"));
    }

    #[test]
    fn test_only_overseer_holds_veto() {
        let holders: Vec<_> = AgentRole::ALL
            .iter()
            .filter(|r| r.has_veto_authority())
            .collect();
        assert_eq!(holders, vec![&AgentRole::Overseer]);
    }

    #[test]
    fn test_agent_ids_are_unique_and_printable() {
        let a = AgentId::new();
        let b = AgentId::new();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
        assert_eq!(a.to_string().parse::<AgentId>().unwrap(), a);
        assert!(AgentId::system().is_system());
    }
}
