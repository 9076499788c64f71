//! Messages exchanged between agents over the bus.
//!
//! Messages are immutable, fire-and-forget values. A response is simply a
//! new message with sender and receiver swapped; the two are linked only by
//! an `in_reply_to` field in the content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::agent::AgentId;
use crate::domain::errors::{DomainError, DomainResult};

/// Unique identifier for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminator for message payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Upward progress report to a supervisor.
    Report,
    /// Downward instruction from a supervisor.
    Directive,
    TaskAssignment,
    CollaborationRequest,
    CollaborationResponse,
    AuditRequest,
    AuditResponse,
    SafetyAlert,
    SafetyReport,
    /// Unconditional stop order. Handled by every runtime regardless of role.
    EmergencyHalt,
    HaltAcknowledged,
    StatusRequest,
    StatusResponse,
}

impl MessageKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Directive => "directive",
            Self::TaskAssignment => "task_assignment",
            Self::CollaborationRequest => "collaboration_request",
            Self::CollaborationResponse => "collaboration_response",
            Self::AuditRequest => "audit_request",
            Self::AuditResponse => "audit_response",
            Self::SafetyAlert => "safety_alert",
            Self::SafetyReport => "safety_report",
            Self::EmergencyHalt => "emergency_halt",
            Self::HaltAcknowledged => "halt_acknowledged",
            Self::StatusRequest => "status_request",
            Self::StatusResponse => "status_response",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report" => Ok(Self::Report),
            "directive" => Ok(Self::Directive),
            "task_assignment" => Ok(Self::TaskAssignment),
            "collaboration_request" => Ok(Self::CollaborationRequest),
            "collaboration_response" => Ok(Self::CollaborationResponse),
            "audit_request" => Ok(Self::AuditRequest),
            "audit_response" => Ok(Self::AuditResponse),
            "safety_alert" => Ok(Self::SafetyAlert),
            "safety_report" => Ok(Self::SafetyReport),
            "emergency_halt" => Ok(Self::EmergencyHalt),
            "halt_acknowledged" => Ok(Self::HaltAcknowledged),
            "status_request" => Ok(Self::StatusRequest),
            "status_response" => Ok(Self::StatusResponse),
            other => Err(DomainError::UnknownMessageKind(other.to_string())),
        }
    }
}

/// An immutable message addressed to exactly one receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: AgentId,
    pub receiver: AgentId,
    pub kind: MessageKind,
    pub content: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Wire envelope; the kind stays a plain string until validated.
#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<MessageId>,
    sender: AgentId,
    receiver: AgentId,
    kind: String,
    #[serde(default)]
    content: serde_json::Value,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        sender: AgentId,
        receiver: AgentId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            receiver,
            kind,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Build a response travelling the opposite way.
    ///
    /// Object content gains an `in_reply_to` field carrying this message's id.
    pub fn reply(&self, kind: MessageKind, content: serde_json::Value) -> Self {
        let content = match content {
            serde_json::Value::Object(mut map) => {
                map.insert(
                    "in_reply_to".to_string(),
                    serde_json::Value::String(self.id.to_string()),
                );
                serde_json::Value::Object(map)
            }
            other => other,
        };
        Self::new(self.receiver, self.sender, kind, content)
    }

    /// Decode a message from JSON, rejecting unknown kinds.
    pub fn decode(json: &str) -> DomainResult<Self> {
        let raw: RawMessage = serde_json::from_str(json)?;
        let kind = raw.kind.parse::<MessageKind>()?;
        Ok(Self {
            id: raw.id.unwrap_or_default(),
            sender: raw.sender,
            receiver: raw.receiver,
            kind,
            content: raw.content,
            timestamp: raw.timestamp.unwrap_or_else(Utc::now),
        })
    }

    /// Value of a top-level string field in the content, if any.
    pub fn content_str(&self, field: &str) -> Option<&str> {
        self.content.get(field).and_then(serde_json::Value::as_str)
    }
}
