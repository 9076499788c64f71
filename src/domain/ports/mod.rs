//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the async trait interfaces the coordination core
//! depends on:
//! - `TaskRepository`: task persistence
//! - `MessageBus` / `MessageHandler`: point-to-point delivery
//! - `RoleBehavior` / `AgentContext`: the role-action plugin seam
//! - `SafetyGate` / `AuditProbe`: safety clearance and audit readings

pub mod message_bus;
pub mod role_behavior;
pub mod safety;
pub mod task_repository;

pub use message_bus::{MessageBus, MessageHandler};
pub use role_behavior::{AgentContext, BehaviorFactory, BroadcastOutcome, RoleBehavior};
pub use safety::{AuditProbe, ProbeReading, SafetyGate};
pub use task_repository::{TaskFilters, TaskRepository};
