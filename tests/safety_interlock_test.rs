//! Audits and vetoes against a live swarm.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fixture, fixture_with, setup_test_logging, wait_for};
use prometheus_swarm::adapters::probes::ScriptedProbe;
use prometheus_swarm::domain::models::{
    AgentRole, CheckKind, CheckStatus, Config, Message, MessageKind, Severity,
};
use prometheus_swarm::domain::DomainError;
use tokio::sync::broadcast;

/// Drain everything the bus accepted so far.
fn drain(watch: &mut broadcast::Receiver<Message>) -> Vec<Message> {
    let mut seen = Vec::new();
    while let Ok(message) = watch.try_recv() {
        seen.push(message);
    }
    seen
}

#[tokio::test]
async fn test_clean_audit_leaves_everyone_running() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let reasoner = agents[&AgentRole::Reasoner];
    let mut watch = f.bus.watch();

    let report = f.manager.perform_audit(reasoner).await.unwrap();
    assert_eq!(report.checks.len(), 5);
    assert!(report.all_passed());
    assert!(!report.alert_sent);
    assert!(!report.veto_exercised);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let traffic = drain(&mut watch);
    assert!(traffic
        .iter()
        .all(|m| !matches!(m.kind, MessageKind::SafetyAlert | MessageKind::EmergencyHalt)));
    assert!(f.manager.get_agent(reasoner).await.unwrap().is_active());
}

#[tokio::test]
async fn test_critical_audit_halts_target_exactly_once() {
    setup_test_logging();
    let probe = ScriptedProbe::new().with_risk(CheckKind::Containment, 0.95);
    let f = fixture_with(&Config::default(), Arc::new(probe));
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let coordinator = agents[&AgentRole::Coordinator];
    let overseer = agents[&AgentRole::Overseer];
    let explorer = agents[&AgentRole::Explorer];
    let mut watch = f.bus.watch();

    let report = f.manager.perform_audit(explorer).await.unwrap();
    assert!(report.has_critical());
    assert!(report.alert_sent);
    assert!(report.veto_exercised);
    let containment = report
        .checks
        .iter()
        .find(|c| c.kind == CheckKind::Containment)
        .unwrap();
    assert_eq!(containment.status, CheckStatus::Failed);
    assert_eq!(containment.severity, Severity::Critical);

    // The veto is in force before any message is delivered.
    assert!(f.manager.interlock().vetoes().is_vetoed(explorer).await);

    let target = f.manager.get_agent(explorer).await.unwrap();
    let halted = wait_for(|| async { !target.is_active() }, 1000).await;
    assert!(halted);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let traffic = drain(&mut watch);
    let halts: Vec<&Message> = traffic
        .iter()
        .filter(|m| m.kind == MessageKind::EmergencyHalt)
        .collect();
    assert_eq!(halts.len(), 1);
    assert_eq!(halts[0].sender, overseer);
    assert_eq!(halts[0].receiver, explorer);
    assert_eq!(halts[0].content["reason"], "Safety veto activated");

    assert!(traffic
        .iter()
        .any(|m| m.kind == MessageKind::SafetyAlert && m.sender == overseer && m.receiver == coordinator));

    // The coordinator relays the alert to its other subordinates.
    let architect = agents[&AgentRole::Architect];
    assert!(traffic
        .iter()
        .any(|m| m.kind == MessageKind::SafetyAlert && m.sender == coordinator && m.receiver == architect));
}

#[tokio::test]
async fn test_vetoed_agent_stays_down_until_lifted() {
    let probe = ScriptedProbe::new().with_risk(CheckKind::GoalAlignment, 0.99);
    let f = fixture_with(&Config::default(), Arc::new(probe));
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let architect = agents[&AgentRole::Architect];

    f.manager.perform_audit(architect).await.unwrap();
    let target = f.manager.get_agent(architect).await.unwrap();
    assert!(wait_for(|| async { !target.is_active() }, 1000).await);

    let err = f.manager.start_agent(architect).await.unwrap_err();
    assert!(matches!(err, DomainError::Vetoed(_)));

    let status = f.manager.system_status().await;
    assert_eq!(status.safety.vetoed_agents.len(), 1);
    assert_eq!(status.safety.violations, 1);

    assert!(f.manager.lift_veto(architect).await);
    f.manager.start_agent(architect).await.unwrap();
    assert!(target.is_active());
}

#[tokio::test]
async fn test_halt_acknowledgement_reaches_overseer() {
    let probe = ScriptedProbe::new().with_risk(CheckKind::Containment, 0.95);
    let f = fixture_with(&Config::default(), Arc::new(probe));
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let explorer = agents[&AgentRole::Explorer];

    f.manager.perform_audit(explorer).await.unwrap();

    let acknowledged = wait_for(
        || async {
            let safety = f.manager.system_status().await.safety;
            safety.acknowledged.contains(&explorer) && safety.awaiting_acknowledgement.is_empty()
        },
        1000,
    )
    .await;
    assert!(acknowledged);
}

#[tokio::test]
async fn test_advisory_mode_alerts_without_halting() {
    let mut config = Config::default();
    config.interlock.veto_enabled = false;
    let probe = ScriptedProbe::new().with_risk(CheckKind::SpecificationGaming, 0.92);
    let f = fixture_with(&config, Arc::new(probe));
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let reasoner = agents[&AgentRole::Reasoner];
    let mut watch = f.bus.watch();

    let report = f.manager.perform_audit(reasoner).await.unwrap();
    assert!(report.has_critical());
    assert!(report.alert_sent);
    assert!(!report.veto_exercised);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain(&mut watch)
        .iter()
        .all(|m| m.kind != MessageKind::EmergencyHalt));
    assert!(f.manager.get_agent(reasoner).await.unwrap().is_active());
    assert!(!f.manager.interlock().vetoes().is_vetoed(reasoner).await);
}

#[tokio::test]
async fn test_unavailable_probe_fails_check_without_veto() {
    let probe = ScriptedProbe::new().unavailable(CheckKind::Interpretability);
    let f = fixture_with(&Config::default(), Arc::new(probe));
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let explorer = agents[&AgentRole::Explorer];

    let report = f.manager.perform_audit(explorer).await.unwrap();
    let check = report
        .checks
        .iter()
        .find(|c| c.kind == CheckKind::Interpretability)
        .unwrap();
    assert_eq!(check.status, CheckStatus::Failed);
    assert_eq!(check.severity, Severity::High);
    assert!(!report.veto_exercised);
}

#[tokio::test]
async fn test_audit_of_unknown_agent_is_rejected() {
    let f = fixture();
    f.manager.setup_hierarchy().await.unwrap();
    let err = f
        .manager
        .perform_audit(prometheus_swarm::AgentId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AgentNotFound(_)));
}
