//! Supervision registry: configured trees, integrity rules and halts.

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{fixture, fixture_with, wait_for};
use prometheus_swarm::adapters::probes::BaselineProbe;
use prometheus_swarm::domain::models::{AgentRole, MessageKind};
use prometheus_swarm::domain::ports::{AgentContext, MessageBus};
use prometheus_swarm::domain::DomainError;
use prometheus_swarm::infrastructure::config::ConfigLoader;
use tokio_test::{assert_err, assert_ok};

fn yaml_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_default_tree_links_both_sides() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    assert_eq!(agents.len(), 5);

    let coordinator = f.manager.get_agent(agents[&AgentRole::Coordinator]).await.unwrap();
    let status = coordinator.status().await;
    assert_eq!(status.supervisor, None);
    assert_eq!(status.subordinates.len(), 3);

    for child in status.subordinates {
        let child = f.manager.get_agent(child).await.unwrap();
        assert_eq!(child.supervisor().await, Some(coordinator.id()));
    }

    let reasoner = f.manager.get_agent(agents[&AgentRole::Reasoner]).await.unwrap();
    assert_eq!(reasoner.supervisor().await, Some(agents[&AgentRole::Architect]));
}

#[tokio::test]
async fn test_configured_chain_from_yaml() {
    let file = yaml_config(
        r"
hierarchy:
  edges:
    - { parent: coordinator, child: overseer }
    - { parent: overseer, child: explorer }
",
    );
    let config = assert_ok!(ConfigLoader::load_from_file(file.path()));
    let f = fixture_with(&config, Arc::new(BaselineProbe));

    let agents = f.manager.setup_hierarchy().await.unwrap();
    assert_eq!(agents.len(), 3);
    assert!(!agents.contains_key(&AgentRole::Architect));

    let roots = f.manager.hierarchy_structure().await;
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].role, AgentRole::Coordinator);
    assert_eq!(roots[0].children[0].role, AgentRole::Overseer);
    assert_eq!(roots[0].children[0].children[0].role, AgentRole::Explorer);
}

#[test]
fn test_invalid_hierarchy_file_is_rejected() {
    let two_parents = yaml_config(
        r"
hierarchy:
  edges:
    - { parent: coordinator, child: reasoner }
    - { parent: architect, child: reasoner }
",
    );
    assert_err!(ConfigLoader::load_from_file(two_parents.path()));

    let unknown_role = yaml_config(
        r"
hierarchy:
  edges:
    - { parent: coordinator, child: janitor }
",
    );
    assert_err!(ConfigLoader::load_from_file(unknown_role.path()));
}

#[tokio::test]
async fn test_integrity_rules_on_live_registry() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let coordinator = agents[&AgentRole::Coordinator];
    let architect = agents[&AgentRole::Architect];
    let reasoner = agents[&AgentRole::Reasoner];

    let err = f.manager.attach(reasoner, coordinator).await.unwrap_err();
    assert!(matches!(err, DomainError::HierarchyCycle { .. }));

    let err = f.manager.attach(coordinator, reasoner).await.unwrap_err();
    assert!(matches!(err, DomainError::SecondParent { .. }));

    // Re-attaching the existing edge is a no-op.
    f.manager.attach(architect, reasoner).await.unwrap();
    let architect_rt = f.manager.get_agent(architect).await.unwrap();
    assert_eq!(architect_rt.subordinates().await, vec![reasoner]);

    let err = f.manager.create_agent(AgentRole::Overseer).await.unwrap_err();
    assert!(matches!(err, DomainError::DuplicateOverseer(_)));
}

#[tokio::test]
async fn test_removed_agent_leaves_the_tree() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let architect = agents[&AgentRole::Architect];

    assert!(f.manager.remove_agent(architect).await.unwrap());
    assert!(!f.manager.remove_agent(architect).await.unwrap());

    let reasoner = f.manager.get_agent(agents[&AgentRole::Reasoner]).await.unwrap();
    assert_eq!(reasoner.supervisor().await, None);

    let roots = f.manager.hierarchy_structure().await;
    assert_eq!(roots.len(), 2);
    assert!(roots.iter().any(|r| r.role == AgentRole::Reasoner));
    assert_eq!(roots[0].children.len(), 2);
}

#[tokio::test]
async fn test_emergency_halt_then_restart() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();

    let report = f.manager.emergency_halt("operator stop").await;
    assert_eq!(report.stopped.len(), 5);
    assert!(report.failures.is_empty());

    let status = f.manager.system_status().await;
    assert_eq!(status.total_agents, 5);
    assert_eq!(status.active_agents, 0);

    // Stopped agents no longer receive traffic.
    let explorer = agents[&AgentRole::Explorer];
    assert!(!f.bus.is_subscribed(explorer).await);

    // A halt notice still in flight predates the restart and is ignored.
    f.manager.start_agent(explorer).await.unwrap();
    assert!(f.bus.is_subscribed(explorer).await);
    let active = wait_for(
        || async { f.manager.system_status().await.active_agents == 1 },
        500,
    )
    .await;
    assert!(active);

    // Give any stale notice time to reach the dispatcher; the agent stays up.
    let stayed_up = !wait_for(
        || async { f.manager.system_status().await.active_agents == 0 },
        200,
    )
    .await;
    assert!(stayed_up);
    f.manager
        .send_message(explorer, agents[&AgentRole::Coordinator], MessageKind::Report, serde_json::json!({}))
        .await
        .unwrap();
}
