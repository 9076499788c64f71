//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use prometheus_swarm::adapters::memory::InMemoryTaskRepository;
use prometheus_swarm::adapters::probes::BaselineProbe;
use prometheus_swarm::adapters::roles::StandardBehaviors;
use prometheus_swarm::domain::models::Config;
use prometheus_swarm::domain::ports::AuditProbe;
use prometheus_swarm::services::{AgentManager, InProcessMessageBus, TaskService};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Poll an async condition every 10ms until it holds or `timeout_ms` passes.
pub async fn wait_for<F, Fut>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if predicate().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A wired swarm with no agents yet.
pub struct Fixture {
    pub bus: Arc<InProcessMessageBus>,
    pub manager: Arc<AgentManager>,
    pub tasks: TaskService,
}

pub fn fixture_with(config: &Config, probe: Arc<dyn AuditProbe>) -> Fixture {
    let bus = Arc::new(InProcessMessageBus::new(config.bus.queue_capacity));
    let manager = Arc::new(AgentManager::new(
        config,
        bus.clone(),
        Arc::new(InMemoryTaskRepository::new()),
        Arc::new(StandardBehaviors::new()),
        probe,
    ));
    let tasks = TaskService::new(manager.clone(), config.monitor.clone());
    Fixture { bus, manager, tasks }
}

pub fn fixture() -> Fixture {
    fixture_with(&Config::default(), Arc::new(BaselineProbe))
}
