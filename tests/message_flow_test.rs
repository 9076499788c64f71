//! Messaging between live agents over the in-process bus.

mod common;

use serde_json::json;
use std::time::Duration;

use common::{fixture, setup_test_logging, wait_for};
use prometheus_swarm::domain::models::{AgentRole, MessageKind};

#[tokio::test]
async fn test_directive_reaches_direct_subordinates_only() {
    setup_test_logging();
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let coordinator = agents[&AgentRole::Coordinator];

    let outcome = f
        .manager
        .broadcast_to_subordinates(coordinator, MessageKind::Directive, json!({ "type": "research_directive" }))
        .await
        .unwrap();

    assert_eq!(outcome.delivered.len(), 3);
    assert!(outcome.failed.is_empty());
    assert!(!outcome.delivered.contains(&agents[&AgentRole::Reasoner]));

    let architect = f.manager.get_agent(agents[&AgentRole::Architect]).await.unwrap();
    let explorer = f.manager.get_agent(agents[&AgentRole::Explorer]).await.unwrap();
    let handled = wait_for(
        || {
            let (architect, explorer) = (architect.clone(), explorer.clone());
            async move {
                architect.status().await.counters.messages_handled >= 1
                    && explorer.status().await.counters.messages_handled >= 1
            }
        },
        1000,
    )
    .await;
    assert!(handled);

    let reasoner = f.manager.get_agent(agents[&AgentRole::Reasoner]).await.unwrap();
    assert_eq!(reasoner.status().await.counters.messages_handled, 0);
}

#[tokio::test]
async fn test_collaboration_request_is_answered() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let architect = agents[&AgentRole::Architect];
    let reasoner = agents[&AgentRole::Reasoner];
    let mut watch = f.bus.watch();

    let request_id = f
        .manager
        .send_message(
            architect,
            reasoner,
            MessageKind::CollaborationRequest,
            json!({ "type": "symbolic_verification" }),
        )
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let message = watch.recv().await.unwrap();
            if message.kind == MessageKind::CollaborationResponse {
                return message;
            }
        }
    })
    .await
    .expect("no collaboration response");

    assert_eq!(reply.sender, reasoner);
    assert_eq!(reply.receiver, architect);
    assert_eq!(reply.content["request_type"], "symbolic_verification");
    assert_eq!(reply.content["in_reply_to"], request_id.to_string());
}

#[tokio::test]
async fn test_reports_from_every_subordinate_advance_the_phase() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let coordinator = f.manager.get_agent(agents[&AgentRole::Coordinator]).await.unwrap();
    assert_eq!(coordinator.status().await.detail["current_phase"], "architecture_design");

    for role in [AgentRole::Architect, AgentRole::Explorer, AgentRole::Overseer] {
        f.manager
            .send_message(
                agents[&role],
                coordinator.id(),
                MessageKind::Report,
                json!({ "insights": [format!("{role} finished")], "challenges": [] }),
            )
            .await
            .unwrap();
    }

    let advanced = wait_for(
        || {
            let coordinator = coordinator.clone();
            async move { coordinator.status().await.detail["current_phase"] == "embodied_learning" }
        },
        1000,
    )
    .await;
    assert!(advanced);
}

#[tokio::test]
async fn test_critical_challenge_blocks_phase_advance() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let coordinator = f.manager.get_agent(agents[&AgentRole::Coordinator]).await.unwrap();

    for role in [AgentRole::Architect, AgentRole::Explorer, AgentRole::Overseer] {
        let challenges = if role == AgentRole::Explorer {
            json!([{ "description": "simulator diverges", "severity": "critical" }])
        } else {
            json!([])
        };
        f.manager
            .send_message(agents[&role], coordinator.id(), MessageKind::Report, json!({ "challenges": challenges }))
            .await
            .unwrap();
    }

    let received = wait_for(
        || {
            let coordinator = coordinator.clone();
            async move { coordinator.status().await.detail["reports_received"] == 3 }
        },
        1000,
    )
    .await;
    assert!(received);
    assert_eq!(coordinator.status().await.detail["current_phase"], "architecture_design");
}

#[tokio::test]
async fn test_handler_failure_does_not_stop_the_agent() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let coordinator = agents[&AgentRole::Coordinator];
    let overseer = f.manager.get_agent(agents[&AgentRole::Overseer]).await.unwrap();

    // An audit request without a target fails inside the overseer.
    f.manager
        .send_message(coordinator, overseer.id(), MessageKind::AuditRequest, json!({}))
        .await
        .unwrap();
    f.manager
        .send_message(coordinator, overseer.id(), MessageKind::StatusRequest, json!({}))
        .await
        .unwrap();

    let settled = wait_for(
        || {
            let overseer = overseer.clone();
            async move {
                let counters = overseer.status().await.counters;
                counters.message_failures == 1 && counters.messages_handled >= 1
            }
        },
        1000,
    )
    .await;
    assert!(settled);
    assert!(overseer.is_active());
    assert_eq!(f.bus.stats().handler_failures, 0);
}

#[tokio::test]
async fn test_messages_to_stopped_agents_are_dropped() {
    let f = fixture();
    let agents = f.manager.setup_hierarchy().await.unwrap();
    let explorer = agents[&AgentRole::Explorer];
    f.manager.stop_agent(explorer).await.unwrap();

    let before = f.bus.stats().dropped;
    f.manager
        .send_message(agents[&AgentRole::Coordinator], explorer, MessageKind::Directive, json!({}))
        .await
        .unwrap();
    assert_eq!(f.bus.stats().dropped, before + 1);
}
