//! Agent runtime: lifecycle, message dispatch and the task execution driver.
//!
//! A runtime wraps one `RoleBehavior`. It subscribes to the bus on `start`,
//! routes delivered messages to the behaviour by kind, and drives tasks
//! through `Pending -> InProgress -> {Completed | Failed}`, persisting every
//! transition before returning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde_json::json;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentCounters, AgentHealth, AgentId, AgentRole, AgentStatus, Message, MessageId, MessageKind,
    Task, TaskId, TaskStatus,
};
use crate::domain::ports::{
    AgentContext, MessageBus, MessageHandler, RoleBehavior, SafetyGate, TaskRepository,
};

/// Collaborators shared by every runtime created by one registry.
#[derive(Clone)]
pub struct RuntimeDeps {
    pub bus: Arc<dyn MessageBus>,
    pub tasks: Arc<dyn TaskRepository>,
    pub gate: Arc<dyn SafetyGate>,
    /// Default deadline for task actions.
    pub task_timeout: Option<Duration>,
}

#[derive(Debug, Default)]
struct Links {
    supervisor: Option<AgentId>,
    subordinates: Vec<AgentId>,
}

#[derive(Debug, Default)]
struct Counters {
    messages_handled: AtomicU64,
    message_failures: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    halts_received: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> AgentCounters {
        AgentCounters {
            messages_handled: self.messages_handled.load(Ordering::Relaxed),
            message_failures: self.message_failures.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            halts_received: self.halts_received.load(Ordering::Relaxed),
        }
    }
}

/// One running agent.
pub struct AgentRuntime {
    id: AgentId,
    role: AgentRole,
    name: String,
    behavior: Arc<dyn RoleBehavior>,
    deps: RuntimeDeps,
    links: RwLock<Links>,
    active: AtomicBool,
    lifecycle: Mutex<()>,
    halt: Mutex<CancellationToken>,
    in_flight: RwLock<HashSet<TaskId>>,
    counters: Counters,
    last_activity_ms: AtomicI64,
    /// Microsecond timestamp of the latest `start`; older halts are stale.
    started_at_us: AtomicI64,
    this: Weak<Self>,
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AgentRuntime {
    pub fn new(behavior: Arc<dyn RoleBehavior>, deps: RuntimeDeps) -> Arc<Self> {
        let role = behavior.role();
        Arc::new_cyclic(|this| Self {
            id: AgentId::new(),
            role,
            name: role.codename().to_string(),
            behavior,
            deps,
            links: RwLock::new(Links::default()),
            active: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            halt: Mutex::new(CancellationToken::new()),
            in_flight: RwLock::new(HashSet::new()),
            counters: Counters::default(),
            last_activity_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            started_at_us: AtomicI64::new(i64::MIN),
            this: this.clone(),
        })
    }

    pub const fn id(&self) -> AgentId {
        self.id
    }

    pub const fn role(&self) -> AgentRole {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity_ms.load(Ordering::Relaxed))
            .unwrap_or_else(Utc::now)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Mark the agent active and subscribe it to the bus. Idempotent.
    ///
    /// Halt notices issued before a start are ignored if they arrive after it.
    pub async fn start(&self) -> DomainResult<()> {
        let _guard = self.lifecycle.lock().await;
        if self.is_active() {
            return Ok(());
        }

        {
            let mut halt = self.halt.lock().await;
            if halt.is_cancelled() {
                *halt = CancellationToken::new();
            }
        }
        self.started_at_us
            .store(Utc::now().timestamp_micros(), Ordering::SeqCst);

        let handler = Arc::new(RuntimeHandler {
            runtime: self.this.clone(),
        });
        self.deps.bus.subscribe(self.id, handler).await?;
        self.active.store(true, Ordering::SeqCst);
        self.touch();
        tracing::info!(agent_id = %self.id, role = %self.role, "agent started");
        Ok(())
    }

    /// Unsubscribe from the bus and mark inactive. Idempotent.
    ///
    /// Hierarchy links are kept.
    pub async fn stop(&self) -> DomainResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.stop_locked().await
    }

    /// Caller holds `lifecycle`.
    async fn stop_locked(&self) -> DomainResult<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.deps.bus.unsubscribe(self.id).await?;
        self.active.store(false, Ordering::SeqCst);
        tracing::info!(agent_id = %self.id, role = %self.role, "agent stopped");
        Ok(())
    }

    /// Abort any in-flight action, then stop.
    pub async fn halt(&self) -> DomainResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.halt.lock().await.cancel();
        self.stop_locked().await
    }

    /// Halt unless the agent was started after `issued_at`.
    ///
    /// The check and the stop share one lifecycle critical section, so a
    /// concurrent `start` is either fully before (halt ignored) or fully after.
    async fn halt_issued_at(&self, issued_at: DateTime<Utc>) -> DomainResult<bool> {
        let _guard = self.lifecycle.lock().await;
        if issued_at.timestamp_micros() < self.started_at_us.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.halt.lock().await.cancel();
        self.stop_locked().await?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Hierarchy links; mutated only by the supervision registry
    // ------------------------------------------------------------------

    pub(crate) async fn add_subordinate(&self, agent: AgentId) {
        let mut links = self.links.write().await;
        if !links.subordinates.contains(&agent) {
            links.subordinates.push(agent);
        }
    }

    pub(crate) async fn remove_subordinate(&self, agent: AgentId) -> bool {
        let mut links = self.links.write().await;
        let before = links.subordinates.len();
        links.subordinates.retain(|a| *a != agent);
        links.subordinates.len() != before
    }

    pub(crate) async fn set_supervisor(&self, supervisor: Option<AgentId>) {
        self.links.write().await.supervisor = supervisor;
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Route one delivered message. Failures are logged and counted, never propagated.
    pub async fn handle_message(&self, message: Message) {
        self.touch();

        if message.kind == MessageKind::EmergencyHalt {
            self.handle_halt(&message).await;
            return;
        }

        if !self.behavior.handled_kinds().contains(&message.kind) {
            tracing::debug!(
                agent_id = %self.id,
                kind = %message.kind,
                "no handler for message kind; ignored"
            );
            return;
        }

        let outcome = AssertUnwindSafe(self.behavior.handle_message(self, &message))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(reply)) => {
                self.counters.messages_handled.fetch_add(1, Ordering::Relaxed);
                if let Some(reply) = reply {
                    if let Err(e) = self.deps.bus.publish(reply).await {
                        tracing::warn!(agent_id = %self.id, error = %e, "failed to publish reply");
                    }
                }
            }
            Ok(Err(e)) => {
                self.counters.message_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    agent_id = %self.id,
                    message_id = %message.id,
                    kind = %message.kind,
                    error = %e,
                    "message handling failed"
                );
            }
            Err(_) => {
                self.counters.message_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    agent_id = %self.id,
                    message_id = %message.id,
                    kind = %message.kind,
                    "message handler panicked"
                );
            }
        }
    }

    async fn handle_halt(&self, message: &Message) {
        let content = match self.halt_issued_at(message.timestamp).await {
            Ok(true) => {
                self.counters.halts_received.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    agent_id = %self.id,
                    role = %self.role,
                    from = %message.sender,
                    reason = message.content_str("reason").unwrap_or("unspecified"),
                    "emergency halt received"
                );
                json!({ "agent_id": self.id, "halted": true })
            }
            Ok(false) => {
                tracing::debug!(
                    agent_id = %self.id,
                    from = %message.sender,
                    "halt issued before latest start; ignored"
                );
                json!({ "agent_id": self.id, "halted": false, "superseded": true })
            }
            Err(e) => {
                self.counters.halts_received.fetch_add(1, Ordering::Relaxed);
                tracing::error!(agent_id = %self.id, error = %e, "failed to stop on halt");
                json!({ "agent_id": self.id, "halted": !self.is_active() })
            }
        };

        let ack = message.reply(MessageKind::HaltAcknowledged, content);
        if let Err(e) = self.deps.bus.publish(ack).await {
            tracing::warn!(agent_id = %self.id, error = %e, "failed to acknowledge halt");
        }
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Drive a pending task to a terminal state using the default deadline.
    pub async fn execute_task(&self, task: Task) -> DomainResult<Task> {
        self.execute_task_with_deadline(task, self.deps.task_timeout)
            .await
    }

    /// Drive a pending task to a terminal state.
    ///
    /// Terminal or already-running tasks, and copies older than the stored
    /// task, are rejected without side effects. Action errors, panics, safety
    /// rejections, halts and an expired `deadline` all end in `Failed`. If the
    /// stored task changed while the action ran, the result is discarded and
    /// the stored task returned; a task deleted meanwhile is `TaskNotFound`.
    pub async fn execute_task_with_deadline(
        &self,
        mut task: Task,
        deadline: Option<Duration>,
    ) -> DomainResult<Task> {
        if task.agent_id != self.id {
            return Err(DomainError::ValidationFailed(format!(
                "task {} belongs to agent {}, not {}",
                task.id, task.agent_id, self.id
            )));
        }
        if task.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: task.status.as_str().to_string(),
                to: TaskStatus::InProgress.as_str().to_string(),
                reason: "task already finished".to_string(),
            });
        }
        if task.status == TaskStatus::InProgress {
            return Err(task_conflict(task.id));
        }
        if !self.is_active() {
            return Err(DomainError::AgentInactive(self.id));
        }

        let read = task.version;
        task.start()?;
        if !self.deps.tasks.save_if_version(&task, read).await? {
            return Err(task_conflict(task.id));
        }
        self.in_flight.write().await.insert(task.id);
        self.touch();
        tracing::info!(agent_id = %self.id, task_id = %task.id, name = %task.name, "task started");

        let started = task.version;
        let outcome = self.run_guarded(&task, deadline).await;
        match outcome {
            Ok(result) => task.complete(result)?,
            Err(reason) => task.fail(reason)?,
        }

        let persisted = self.deps.tasks.save_if_version(&task, started).await;
        self.in_flight.write().await.remove(&task.id);
        self.touch();

        if !persisted? {
            let stored = self
                .deps
                .tasks
                .get_by_id(task.id)
                .await?
                .ok_or(DomainError::TaskNotFound(task.id))?;
            tracing::info!(
                agent_id = %self.id,
                task_id = %task.id,
                status = %stored.status,
                "task changed while running; result discarded"
            );
            return Ok(stored);
        }

        match task.status {
            TaskStatus::Completed => {
                self.counters.tasks_completed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(agent_id = %self.id, task_id = %task.id, "task completed");
            }
            _ => {
                self.counters.tasks_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    agent_id = %self.id,
                    task_id = %task.id,
                    error = task.error.as_deref().unwrap_or_default(),
                    "task failed"
                );
            }
        }
        Ok(task)
    }

    /// Safety pre-check, then the role action under deadline and halt.
    async fn run_guarded(
        &self,
        task: &Task,
        deadline: Option<Duration>,
    ) -> Result<serde_json::Value, String> {
        let checks = self.deps.gate.pre_execution_checks(self.id, task).await;
        if let Some(blocking) = checks.iter().find(|c| c.is_failed()) {
            tracing::warn!(
                agent_id = %self.id,
                task_id = %task.id,
                check = %blocking.kind,
                "safety pre-check rejected task"
            );
            return Err(format!("Safety check failed: {}", blocking.message));
        }

        let halt = self.halt.lock().await.clone();
        let action = AssertUnwindSafe(self.behavior.execute(self, task)).catch_unwind();
        let timed = async {
            match deadline {
                Some(limit) => tokio::time::timeout(limit, action).await.map_err(|_| {
                    format!("task exceeded deadline of {}ms", limit.as_millis())
                }),
                None => Ok(action.await),
            }
        };

        let outcome = tokio::select! {
            biased;
            () = halt.cancelled() => return Err("halted by emergency stop".to_string()),
            outcome = timed => outcome?,
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err("task action panicked".to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Observability
    // ------------------------------------------------------------------

    pub async fn status(&self) -> AgentStatus {
        let (supervisor, subordinates) = {
            let links = self.links.read().await;
            (links.supervisor, links.subordinates.clone())
        };
        AgentStatus {
            agent_id: self.id,
            role: self.role,
            name: self.name.clone(),
            is_active: self.is_active(),
            supervisor,
            subordinates,
            active_tasks: self.in_flight.read().await.iter().copied().collect(),
            counters: self.counters.snapshot(),
            detail: self.behavior.detail().await,
        }
    }

    pub async fn health(&self) -> AgentHealth {
        let is_active = self.is_active();
        let subscribed = self.deps.bus.is_subscribed(self.id).await;
        AgentHealth {
            agent_id: self.id,
            healthy: is_active && subscribed,
            is_active,
            subscribed,
            last_activity: self.last_activity(),
            message_failures: self.counters.message_failures.load(Ordering::Relaxed),
        }
    }
}

fn task_conflict(id: TaskId) -> DomainError {
    DomainError::ConcurrencyConflict {
        entity: "task".to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl AgentContext for AgentRuntime {
    fn agent_id(&self) -> AgentId {
        self.id
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    async fn supervisor(&self) -> Option<AgentId> {
        self.links.read().await.supervisor
    }

    async fn subordinates(&self) -> Vec<AgentId> {
        self.links.read().await.subordinates.clone()
    }

    async fn send(
        &self,
        receiver: AgentId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> DomainResult<MessageId> {
        let message = Message::new(self.id, receiver, kind, content);
        let id = message.id;
        self.deps.bus.publish(message).await?;
        Ok(id)
    }
}

/// Bus handler holding a weak reference so subscriptions never keep a runtime alive.
struct RuntimeHandler {
    runtime: Weak<AgentRuntime>,
}

#[async_trait]
impl MessageHandler for RuntimeHandler {
    async fn handle(&self, message: Message) -> DomainResult<()> {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.handle_message(message).await;
        }
        Ok(())
    }
}
