//! Domain errors for the Prometheus coordination runtime.

use thiserror::Error;

use crate::domain::models::{AgentId, AgentRole, TaskId};

/// Domain-level errors that can occur in the coordination runtime.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown agent role: {0}")]
    UnknownRole(String),

    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Hierarchy cycle: attaching {child} under {parent} would create a cycle")]
    HierarchyCycle { parent: AgentId, child: AgentId },

    #[error("Agent {child} already reports to {existing}; cannot attach under {requested}")]
    SecondParent {
        child: AgentId,
        existing: AgentId,
        requested: AgentId,
    },

    #[error("An agent with role {0} already exists")]
    DuplicateOverseer(AgentRole),

    #[error("Message queue for {receiver} is full (capacity {capacity})")]
    BusCapacity { receiver: AgentId, capacity: usize },

    #[error("Agent {0} is not active")]
    AgentInactive(AgentId),

    #[error("Agent {0} is halted by a safety veto")]
    Vetoed(AgentId),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Whether the caller may retry the same operation later.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::BusCapacity { .. })
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_capacity_is_retryable() {
        let full = DomainError::BusCapacity {
            receiver: AgentId::new(),
            capacity: 4,
        };
        assert!(full.is_retryable());
        assert!(!DomainError::UnknownRole("pilot".into()).is_retryable());
        assert!(!DomainError::AgentInactive(AgentId::new()).is_retryable());
    }

    #[test]
    fn test_error_messages_name_the_subject() {
        let err = DomainError::UnknownMessageKind("telepathy".into());
        assert_eq!(err.to_string(), "Unknown message kind: telepathy");

        let id = TaskId::new();
        assert!(DomainError::TaskNotFound(id).to_string().contains(&id.to_string()));
    }
}
