//! Prometheus - supervised research agent swarm
//!
//! A small, in-process coordination runtime: role-bound agents exchange typed
//! messages over a bounded bus, execute tasks through a checked state
//! machine, and answer to an overseer that can audit any agent and veto it.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): bus, agent runtime, supervision registry,
//!   task service and safety interlock
//! - **Adapters** (`adapters`): in-memory task store, audit probes and the
//!   built-in role behaviours
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use prometheus_swarm::adapters::{memory::InMemoryTaskRepository, probes::BaselineProbe, roles::StandardBehaviors};
//! use prometheus_swarm::services::{AgentManager, InProcessMessageBus};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = prometheus_swarm::Config::default();
//!     let manager = AgentManager::new(
//!         &config,
//!         Arc::new(InProcessMessageBus::default()),
//!         Arc::new(InMemoryTaskRepository::new()),
//!         Arc::new(StandardBehaviors::new()),
//!         Arc::new(BaselineProbe),
//!     );
//!     let agents = manager.setup_hierarchy().await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AgentId, AgentRole, AgentStatus, AuditReport, CheckKind, Config, Message, MessageKind, Task,
    TaskId, TaskPriority, TaskStatus,
};
pub use domain::ports::{
    AgentContext, AuditProbe, BehaviorFactory, MessageBus, RoleBehavior, SafetyGate, TaskFilters,
    TaskRepository,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AgentManager, AgentRuntime, InProcessMessageBus, SafetyInterlock, TaskService};
