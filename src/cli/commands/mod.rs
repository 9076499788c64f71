//! CLI command implementations.

pub mod audit;
pub mod demo;
pub mod hierarchy;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::memory::InMemoryTaskRepository;
use crate::adapters::roles::StandardBehaviors;
use crate::domain::models::Config;
use crate::domain::ports::AuditProbe;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{AgentManager, InProcessMessageBus, TaskService};

/// Load the explicit config file when given, the layered defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// One fully wired in-process swarm.
pub(crate) struct Swarm {
    pub bus: Arc<InProcessMessageBus>,
    pub manager: Arc<AgentManager>,
    pub tasks: TaskService,
}

impl Swarm {
    pub(crate) fn new(config: &Config, probe: Arc<dyn AuditProbe>) -> Self {
        let bus = Arc::new(InProcessMessageBus::new(config.bus.queue_capacity));
        let manager = Arc::new(AgentManager::new(
            config,
            bus.clone(),
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(StandardBehaviors::new()),
            probe,
        ));
        let tasks = TaskService::new(manager.clone(), config.monitor.clone());
        Self { bus, manager, tasks }
    }

    /// Halt every agent and close the bus.
    pub(crate) async fn shutdown(&self) {
        for agent in self.manager.list_agents().await {
            if let Err(e) = agent.stop().await {
                tracing::warn!(agent_id = %agent.id(), error = %e, "agent did not stop cleanly");
            }
        }
        self.bus.shutdown().await;
    }
}
