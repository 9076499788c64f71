//! Supervision registry: agent creation, the supervision tree, fan-out and
//! emergency halt.
//!
//! The registry is the only writer of hierarchy edges. Edge mutations are
//! serialized behind one lock and validated so the graph stays a forest of
//! single-parent trees.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentId, AgentRole, AgentStatus, AuditReport, Config, HierarchyConfig, Message, MessageId,
    MessageKind,
};
use crate::domain::ports::{
    AgentContext, AuditProbe, BehaviorFactory, BroadcastOutcome, MessageBus, RoleBehavior,
    TaskRepository,
};
use crate::services::agent_runtime::{AgentRuntime, RuntimeDeps};
use crate::services::safety_interlock::{SafetyInterlock, SafetyStatus};

/// One node of the rendered supervision tree.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyNode {
    pub agent_id: AgentId,
    pub role: AgentRole,
    pub name: String,
    pub is_active: bool,
    pub children: Vec<HierarchyNode>,
}

/// Outcome of a registry-wide emergency halt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HaltReport {
    pub reason: String,
    pub stopped: Vec<AgentId>,
    pub failures: Vec<(AgentId, String)>,
    /// Notices handed to a live subscription. Delivery stays best-effort:
    /// the direct stop can cancel the dispatcher before it runs the notice.
    pub notified: usize,
}

/// Registry-wide snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub total_agents: usize,
    pub active_agents: usize,
    pub agents: Vec<AgentStatus>,
    pub safety: SafetyStatus,
}

pub struct AgentManager {
    deps: RuntimeDeps,
    factory: Arc<dyn BehaviorFactory>,
    interlock: Arc<SafetyInterlock>,
    /// Creation order.
    agents: RwLock<Vec<Arc<AgentRuntime>>>,
    edges: Mutex<()>,
    hierarchy: HierarchyConfig,
}

impl AgentManager {
    pub fn new(
        config: &Config,
        bus: Arc<dyn MessageBus>,
        tasks: Arc<dyn TaskRepository>,
        factory: Arc<dyn BehaviorFactory>,
        probe: Arc<dyn AuditProbe>,
    ) -> Self {
        let interlock = Arc::new(SafetyInterlock::new(&config.interlock, probe));
        let deps = RuntimeDeps {
            bus,
            tasks,
            gate: Arc::new(interlock.gate()),
            task_timeout: config.runtime.task_timeout(),
        };
        Self {
            deps,
            factory,
            interlock,
            agents: RwLock::new(Vec::new()),
            edges: Mutex::new(()),
            hierarchy: config.hierarchy.clone(),
        }
    }

    pub fn interlock(&self) -> Arc<SafetyInterlock> {
        self.interlock.clone()
    }

    pub fn bus(&self) -> Arc<dyn MessageBus> {
        self.deps.bus.clone()
    }

    pub fn tasks(&self) -> Arc<dyn TaskRepository> {
        self.deps.tasks.clone()
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Create and start an agent bound to `role`.
    ///
    /// At most one Overseer may exist; it is bound to this registry's interlock.
    pub async fn create_agent(&self, role: AgentRole) -> DomainResult<Arc<AgentRuntime>> {
        let runtime = {
            let mut agents = self.agents.write().await;
            let behavior: Arc<dyn RoleBehavior> = if role == AgentRole::Overseer {
                if agents.iter().any(|a| a.role() == AgentRole::Overseer) {
                    return Err(DomainError::DuplicateOverseer(role));
                }
                self.interlock.clone() as Arc<dyn RoleBehavior>
            } else {
                self.factory
                    .create(role)
                    .ok_or_else(|| DomainError::UnknownRole(role.to_string()))?
            };
            if behavior.role() != role {
                return Err(DomainError::ValidationFailed(format!(
                    "behaviour bound to {role} reports role {}",
                    behavior.role()
                )));
            }
            let runtime = AgentRuntime::new(behavior, self.deps.clone());
            agents.push(runtime.clone());
            runtime
        };

        runtime.start().await?;
        tracing::info!(agent_id = %runtime.id(), role = %role, "agent created");
        Ok(runtime)
    }

    /// Create an agent from a role name or codename.
    pub async fn create_agent_named(&self, role: &str) -> DomainResult<Arc<AgentRuntime>> {
        self.create_agent(role.parse()?).await
    }

    pub async fn get_agent(&self, id: AgentId) -> Option<Arc<AgentRuntime>> {
        self.agents.read().await.iter().find(|a| a.id() == id).cloned()
    }

    /// First agent created with `role`.
    pub async fn get_agent_by_role(&self, role: AgentRole) -> Option<Arc<AgentRuntime>> {
        self.agents
            .read()
            .await
            .iter()
            .find(|a| a.role() == role)
            .cloned()
    }

    pub async fn list_agents(&self) -> Vec<Arc<AgentRuntime>> {
        self.agents.read().await.clone()
    }

    async fn require(&self, id: AgentId) -> DomainResult<Arc<AgentRuntime>> {
        self.get_agent(id)
            .await
            .ok_or_else(|| DomainError::AgentNotFound(id.to_string()))
    }

    /// Start an agent. Refused while a safety veto is in place.
    pub async fn start_agent(&self, id: AgentId) -> DomainResult<()> {
        let agent = self.require(id).await?;
        if self.interlock.vetoes().is_vetoed(id).await {
            return Err(DomainError::Vetoed(id));
        }
        agent.start().await
    }

    pub async fn stop_agent(&self, id: AgentId) -> DomainResult<()> {
        self.require(id).await?.stop().await
    }

    /// Stop an agent, sever all of its edges and forget it.
    ///
    /// Returns `false` when the agent is unknown.
    pub async fn remove_agent(&self, id: AgentId) -> DomainResult<bool> {
        let Some(agent) = self.get_agent(id).await else {
            return Ok(false);
        };
        agent.stop().await?;

        {
            let _edges = self.edges.lock().await;
            if let Some(supervisor) = agent.supervisor().await {
                if let Some(parent) = self.get_agent(supervisor).await {
                    parent.remove_subordinate(id).await;
                }
            }
            for child_id in agent.subordinates().await {
                if let Some(child) = self.get_agent(child_id).await {
                    child.set_supervisor(None).await;
                }
                agent.remove_subordinate(child_id).await;
            }
            agent.set_supervisor(None).await;

            // Deregister before releasing the edge lock so a queued attach
            // cannot link to this agent.
            self.agents.write().await.retain(|a| a.id() != id);
        }

        tracing::info!(agent_id = %id, role = %agent.role(), "agent removed");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    /// Make `child` a subordinate of `parent`.
    ///
    /// Re-attaching to the same parent is a no-op. A second parent or an
    /// edge that would close a cycle is rejected.
    pub async fn attach(&self, parent: AgentId, child: AgentId) -> DomainResult<()> {
        let _edges = self.edges.lock().await;
        let parent_rt = self.require(parent).await?;
        let child_rt = self.require(child).await?;

        if parent == child {
            return Err(DomainError::HierarchyCycle { parent, child });
        }
        match child_rt.supervisor().await {
            Some(existing) if existing == parent => return Ok(()),
            Some(existing) => {
                return Err(DomainError::SecondParent {
                    child,
                    existing,
                    requested: parent,
                })
            }
            None => {}
        }

        // Walk up from the parent; meeting the child means a cycle.
        let mut cursor = parent_rt.supervisor().await;
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(DomainError::HierarchyCycle { parent, child });
            }
            cursor = match self.get_agent(ancestor).await {
                Some(rt) => rt.supervisor().await,
                None => None,
            };
        }

        parent_rt.add_subordinate(child).await;
        child_rt.set_supervisor(Some(parent)).await;
        tracing::debug!(parent = %parent, child = %child, "hierarchy edge added");
        Ok(())
    }

    /// Remove `child` from its supervisor. Returns whether an edge existed.
    pub async fn detach(&self, child: AgentId) -> DomainResult<bool> {
        let _edges = self.edges.lock().await;
        let child_rt = self.require(child).await?;
        let Some(parent) = child_rt.supervisor().await else {
            return Ok(false);
        };
        if let Some(parent_rt) = self.get_agent(parent).await {
            parent_rt.remove_subordinate(child).await;
        }
        child_rt.set_supervisor(None).await;
        tracing::debug!(parent = %parent, child = %child, "hierarchy edge removed");
        Ok(true)
    }

    /// Build the configured tree, reusing agents that already exist.
    pub async fn setup_hierarchy(&self) -> DomainResult<BTreeMap<AgentRole, AgentId>> {
        let mut ids = BTreeMap::new();
        for role in self.hierarchy.roles() {
            let agent = match self.get_agent_by_role(role).await {
                Some(agent) => agent,
                None => self.create_agent(role).await?,
            };
            ids.insert(role, agent.id());
        }
        for edge in &self.hierarchy.edges {
            if let (Some(parent), Some(child)) = (ids.get(&edge.parent), ids.get(&edge.child)) {
                self.attach(*parent, *child).await?;
            }
        }
        tracing::info!(agents = ids.len(), edges = self.hierarchy.edges.len(), "hierarchy ready");
        Ok(ids)
    }

    /// The supervision forest, roots in creation order.
    pub async fn hierarchy_structure(&self) -> Vec<HierarchyNode> {
        let agents = self.list_agents().await;
        let mut roots = Vec::new();
        for agent in &agents {
            if agent.supervisor().await.is_none() {
                roots.push(self.build_node(agent).await);
            }
        }
        roots
    }

    async fn build_node(&self, agent: &Arc<AgentRuntime>) -> HierarchyNode {
        // Iterative to avoid async recursion.
        let mut node = HierarchyNode {
            agent_id: agent.id(),
            role: agent.role(),
            name: agent.name().to_string(),
            is_active: agent.is_active(),
            children: Vec::new(),
        };
        let mut stack: Vec<(Vec<usize>, AgentId)> = agent
            .subordinates()
            .await
            .into_iter()
            .map(|c| (Vec::new(), c))
            .collect();
        stack.reverse();

        while let Some((path, id)) = stack.pop() {
            let Some(child) = self.get_agent(id).await else {
                continue;
            };
            let mut parent = &mut node;
            for index in &path {
                parent = &mut parent.children[*index];
            }
            parent.children.push(HierarchyNode {
                agent_id: child.id(),
                role: child.role(),
                name: child.name().to_string(),
                is_active: child.is_active(),
                children: Vec::new(),
            });
            let mut child_path = path.clone();
            child_path.push(parent.children.len() - 1);
            for grandchild in child.subordinates().await.into_iter().rev() {
                stack.push((child_path.clone(), grandchild));
            }
        }
        node
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    pub async fn send_message(
        &self,
        sender: AgentId,
        receiver: AgentId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> DomainResult<MessageId> {
        self.require(sender).await?.send(receiver, kind, content).await
    }

    /// Fan out to the sender's direct subordinates only.
    pub async fn broadcast_to_subordinates(
        &self,
        sender: AgentId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> DomainResult<BroadcastOutcome> {
        let agent = self.require(sender).await?;
        Ok(agent.broadcast_to_subordinates(kind, content).await)
    }

    /// Send to every managed agent except the sender.
    pub async fn broadcast_all(
        &self,
        sender: AgentId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> DomainResult<BroadcastOutcome> {
        let agent = self.require(sender).await?;
        let mut outcome = BroadcastOutcome::default();
        for receiver in self.list_agents().await.iter().map(|a| a.id()) {
            if receiver == sender {
                continue;
            }
            match agent.send(receiver, kind, content.clone()).await {
                Ok(_) => outcome.delivered.push(receiver),
                Err(e) => outcome.failed.push((receiver, e.to_string())),
            }
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Safety
    // ------------------------------------------------------------------

    /// Halt every managed agent, continuing past individual failures.
    pub async fn emergency_halt(&self, reason: &str) -> HaltReport {
        tracing::error!(reason, "emergency halt initiated");
        let mut report = HaltReport {
            reason: reason.to_string(),
            ..HaltReport::default()
        };
        let bus = self.bus();

        for agent in self.list_agents().await {
            // Publishing to a stopped agent is a silent drop.
            if bus.is_subscribed(agent.id()).await {
                let message = Message::new(
                    AgentId::system(),
                    agent.id(),
                    MessageKind::EmergencyHalt,
                    json!({ "reason": reason, "halt_all_operations": true }),
                );
                match bus.publish(message).await {
                    Ok(()) => report.notified += 1,
                    Err(e) => tracing::warn!(agent_id = %agent.id(), error = %e, "halt notice not delivered"),
                }
            }

            match agent.halt().await {
                Ok(()) => report.stopped.push(agent.id()),
                Err(e) => {
                    tracing::error!(agent_id = %agent.id(), error = %e, "failed to stop agent during halt");
                    report.failures.push((agent.id(), e.to_string()));
                }
            }
        }
        report
    }

    /// Audit `target` through the registered overseer.
    pub async fn perform_audit(&self, target: AgentId) -> DomainResult<AuditReport> {
        let overseer = self
            .get_agent_by_role(AgentRole::Overseer)
            .await
            .ok_or_else(|| DomainError::AgentNotFound(AgentRole::Overseer.to_string()))?;
        self.require(target).await?;
        Ok(self.interlock.perform_audit(overseer.as_ref(), target).await)
    }

    /// Clear a veto so the agent can be started again.
    pub async fn lift_veto(&self, id: AgentId) -> bool {
        self.interlock.lift_veto(id).await
    }

    pub async fn system_status(&self) -> SystemStatus {
        let agents = self.list_agents().await;
        let mut statuses = Vec::with_capacity(agents.len());
        for agent in &agents {
            statuses.push(agent.status().await);
        }
        SystemStatus {
            total_agents: statuses.len(),
            active_agents: statuses.iter().filter(|s| s.is_active).count(),
            agents: statuses,
            safety: self.interlock.safety_status().await,
        }
    }
}
