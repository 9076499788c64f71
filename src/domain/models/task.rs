//! Task domain model.
//!
//! Tasks are discrete units of work owned by one agent. Their status only
//! moves forward along the state machine below; terminal states never change.
//!
//! ```text
//! Pending ──► InProgress ──► Completed
//!    │            │    └───► Failed
//!    └────────────┴────────► Cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::agent::AgentId;
use crate::domain::errors::{DomainError, DomainResult};

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a task in its lifecycle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, waiting for dispatch
    #[default]
    Pending,
    /// Being executed by its agent
    InProgress,
    /// Action returned a result
    Completed,
    /// Safety pre-check rejected it or the action raised
    Failed,
    /// Cancelled by an external request
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" | "in-progress" | "running" => Some(Self::InProgress),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Pending => vec![Self::InProgress, Self::Cancelled],
            Self::InProgress => vec![Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level for tasks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl TaskPriority {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work assigned to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub agent_id: AgentId,
    pub name: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only when the task reaches `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Bumped on every change; conditional saves compare it.
    #[serde(default = "initial_version")]
    pub version: u64,
}

const fn initial_version() -> u64 {
    1
}

impl Task {
    pub fn new(agent_id: AgentId, name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            agent_id,
            name: name.into(),
            description: description.into(),
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            result: None,
            error: None,
            metadata: HashMap::new(),
            version: initial_version(),
        }
    }

    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// String value of a metadata entry, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    /// Record a change: bump the version and advance `updated_at`, never
    /// letting it move backwards.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
        self.version += 1;
    }

    fn transition_to(&mut self, new_status: TaskStatus, reason: &str) -> DomainResult<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: reason.to_string(),
            });
        }
        self.status = new_status;
        self.touch();
        Ok(())
    }

    /// Pending -> InProgress.
    pub fn start(&mut self) -> DomainResult<()> {
        self.transition_to(TaskStatus::InProgress, "only pending tasks can start")
    }

    /// InProgress -> Completed, attaching the result.
    pub fn complete(&mut self, result: serde_json::Value) -> DomainResult<()> {
        self.transition_to(TaskStatus::Completed, "only running tasks can complete")?;
        self.result = Some(result);
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// InProgress -> Failed. `completed_at` stays unset.
    pub fn fail(&mut self, error: impl Into<String>) -> DomainResult<()> {
        self.transition_to(TaskStatus::Failed, "only running tasks can fail")?;
        self.error = Some(error.into());
        Ok(())
    }

    /// {Pending, InProgress} -> Cancelled. Returns false and changes nothing otherwise.
    pub fn cancel(&mut self) -> bool {
        self.transition_to(TaskStatus::Cancelled, "task already finished")
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> Task {
        Task::new(AgentId::new(), "probe", "exercise the state machine")
    }

    #[test]
    fn test_new_task_is_pending() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.priority, TaskPriority::Medium);
        assert_eq!(t.created_at, t.updated_at);
        assert!(t.completed_at.is_none());
        assert_eq!(t.version, 1);
    }

    #[test]
    fn test_every_change_bumps_version() {
        let mut t = task();
        t.start().unwrap();
        assert_eq!(t.version, 2);
        t.complete(json!(null)).unwrap();
        assert_eq!(t.version, 3);

        // Rejected transitions leave it alone.
        assert!(!t.cancel());
        assert_eq!(t.version, 3);
    }

    #[test]
    fn test_happy_path_sets_completed_at() {
        let mut t = task();
        t.start().unwrap();
        t.complete(json!({"ok": true})).unwrap();
        assert_eq!(t.status, TaskStatus::Completed);
        assert!(t.completed_at.is_some());
        assert!(t.updated_at >= t.created_at);
        assert_eq!(t.result, Some(json!({"ok": true})));
    }

    #[test]
    fn test_failure_leaves_completed_at_unset() {
        let mut t = task();
        t.start().unwrap();
        t.fail("boom").unwrap();
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.error.as_deref(), Some("boom"));
        assert!(t.completed_at.is_none());
    }

    #[test]
    fn test_cannot_complete_without_starting() {
        let mut t = task();
        let err = t.complete(json!(null)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(t.status, TaskStatus::Pending);
    }

    #[test]
    fn test_cancel_from_pending_and_in_progress() {
        let mut pending = task();
        assert!(pending.cancel());
        assert_eq!(pending.status, TaskStatus::Cancelled);

        let mut running = task();
        running.start().unwrap();
        assert!(running.cancel());
        assert!(running.completed_at.is_none());
    }

    #[test]
    fn test_cancel_terminal_is_noop() {
        let mut t = task();
        t.start().unwrap();
        t.complete(json!(1)).unwrap();
        let before = t.clone();
        assert!(!t.cancel());
        assert_eq!(t, before);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in TaskStatus::ALL {
            assert_eq!(status.is_terminal(), status.valid_transitions().is_empty());
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Low < TaskPriority::Medium);
        assert!(TaskPriority::Medium < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Critical);
        assert_eq!(TaskPriority::from_str("CRITICAL"), Some(TaskPriority::Critical));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(TaskStatus::from_str("in_progress"), Some(TaskStatus::InProgress));
    }
}
