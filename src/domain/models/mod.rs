//! Domain models.

pub mod agent;
pub mod config;
pub mod message;
pub mod safety;
pub mod task;

pub use agent::{AgentHealth, AgentId, AgentRole, AgentStatus, AgentCounters};
pub use config::{
    BusConfig, Config, HierarchyConfig, HierarchyEdge, InterlockConfig, LoggingConfig,
    MonitorConfig, RuntimeConfig, RiskThresholds,
};
pub use message::{Message, MessageId, MessageKind};
pub use safety::{AuditReport, CheckKind, CheckStatus, SafetyCheck, Severity};
pub use task::{Task, TaskId, TaskPriority, TaskStatus};
