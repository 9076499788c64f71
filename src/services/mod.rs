//! Application services: bus, agent runtime, supervision registry, task
//! service and safety interlock.

pub mod agent_manager;
pub mod agent_runtime;
pub mod message_bus;
pub mod safety_interlock;
pub mod task_service;

pub use agent_manager::{AgentManager, HaltReport, HierarchyNode, SystemStatus};
pub use agent_runtime::{AgentRuntime, RuntimeDeps};
pub use message_bus::{BusStatsSnapshot, InProcessMessageBus};
pub use safety_interlock::{grade, InterlockGate, SafetyInterlock, SafetyStatus, VetoRecord, VetoRegistry};
pub use task_service::{StuckTask, TaskService, TaskStatistics, TaskUpdate};
