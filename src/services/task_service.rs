//! Task service: the external entry point for creating, running and
//! inspecting tasks.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentId, MonitorConfig, Task, TaskId, TaskPriority, TaskStatus};
use crate::domain::ports::{TaskFilters, TaskRepository};
use crate::services::agent_manager::AgentManager;

/// Conditional-save attempts before a cancel gives up.
const CANCEL_ATTEMPTS: usize = 3;

/// Editable fields of a pending task. Status is never writable here.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_agent: BTreeMap<AgentId, usize>,
    /// Completed share of all tasks, 0 when there are none
    pub completion_rate: f64,
    pub failure_rate: f64,
}

/// An in-progress task that has not been touched within the stuck threshold.
#[derive(Debug, Clone, Serialize)]
pub struct StuckTask {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub name: String,
    pub idle_secs: i64,
}

pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    agents: Arc<AgentManager>,
    monitor: MonitorConfig,
}

impl TaskService {
    pub fn new(agents: Arc<AgentManager>, monitor: MonitorConfig) -> Self {
        Self {
            tasks: agents.tasks(),
            agents,
            monitor,
        }
    }

    async fn require(&self, id: TaskId) -> DomainResult<Task> {
        self.tasks
            .get_by_id(id)
            .await?
            .ok_or(DomainError::TaskNotFound(id))
    }

    async fn require_agent(&self, agent_id: AgentId) -> DomainResult<()> {
        if self.agents.get_agent(agent_id).await.is_none() {
            return Err(DomainError::AgentNotFound(agent_id.to_string()));
        }
        Ok(())
    }

    /// Create a pending task for an existing agent.
    pub async fn create_task(
        &self,
        agent_id: AgentId,
        name: &str,
        description: &str,
        priority: TaskPriority,
        metadata: HashMap<String, serde_json::Value>,
    ) -> DomainResult<Task> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("task name cannot be empty".to_string()));
        }
        self.require_agent(agent_id).await?;

        let mut task = Task::new(agent_id, name, description).with_priority(priority);
        task.metadata = metadata;
        self.tasks.save(&task).await?;
        tracing::info!(task_id = %task.id, agent_id = %agent_id, priority = %priority, "task created");
        Ok(task)
    }

    pub async fn get_task(&self, id: TaskId) -> DomainResult<Option<Task>> {
        self.tasks.get_by_id(id).await
    }

    /// Edit a pending task.
    pub async fn update_task(&self, id: TaskId, update: TaskUpdate) -> DomainResult<Task> {
        let mut task = self.require(id).await?;
        let read = task.version;
        if task.status != TaskStatus::Pending {
            return Err(DomainError::ValidationFailed(format!(
                "task {id} is {} and can no longer be edited",
                task.status
            )));
        }
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DomainError::ValidationFailed("task name cannot be empty".to_string()));
            }
            task.name = name;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(metadata) = update.metadata {
            task.metadata.extend(metadata);
        }
        task.touch();

        if !self.tasks.save_if_version(&task, read).await? {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: id.to_string(),
            });
        }
        Ok(task)
    }

    /// Delete a task that is not running. Returns whether it existed.
    pub async fn delete_task(&self, id: TaskId) -> DomainResult<bool> {
        let Some(task) = self.tasks.get_by_id(id).await? else {
            return Ok(false);
        };
        if task.status == TaskStatus::InProgress {
            return Err(DomainError::ValidationFailed(format!(
                "task {id} is running; cancel it first"
            )));
        }
        if !self.tasks.delete_if_version(id, task.version).await? {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: id.to_string(),
            });
        }
        Ok(true)
    }

    /// Run a stored task on its agent with the default deadline.
    ///
    /// A missing agent is an error and leaves the task pending.
    pub async fn execute_task(&self, id: TaskId) -> DomainResult<Task> {
        let task = self.require(id).await?;
        let agent = self
            .agents
            .get_agent(task.agent_id)
            .await
            .ok_or_else(|| DomainError::AgentNotFound(task.agent_id.to_string()))?;
        agent.execute_task(task).await
    }

    pub async fn execute_task_with_deadline(&self, id: TaskId, deadline: Duration) -> DomainResult<Task> {
        let task = self.require(id).await?;
        let agent = self
            .agents
            .get_agent(task.agent_id)
            .await
            .ok_or_else(|| DomainError::AgentNotFound(task.agent_id.to_string()))?;
        agent.execute_task_with_deadline(task, Some(deadline)).await
    }

    /// Cancel a pending or running task.
    ///
    /// Returns `false` and changes nothing for terminal tasks. The save is
    /// conditional on the version read, and retried if it moved underneath.
    pub async fn cancel_task(&self, id: TaskId) -> DomainResult<bool> {
        for _ in 0..CANCEL_ATTEMPTS {
            let mut task = self.require(id).await?;
            let observed = task.status;
            let read = task.version;
            if !task.cancel() {
                return Ok(false);
            }
            if self.tasks.save_if_version(&task, read).await? {
                tracing::info!(task_id = %id, from = %observed, "task cancelled");
                return Ok(true);
            }
            tracing::debug!(task_id = %id, "task status moved during cancel; retrying");
        }
        Err(DomainError::ConcurrencyConflict {
            entity: "task".to_string(),
            id: id.to_string(),
        })
    }

    pub async fn list_tasks(&self, filters: &TaskFilters) -> DomainResult<Vec<Task>> {
        self.tasks.find_by_criteria(filters).await
    }

    pub async fn tasks_by_agent(&self, agent_id: AgentId) -> DomainResult<Vec<Task>> {
        self.list_tasks(&TaskFilters {
            agent_id: Some(agent_id),
            ..TaskFilters::default()
        })
        .await
    }

    async fn tasks_with_status(&self, status: TaskStatus) -> DomainResult<Vec<Task>> {
        self.list_tasks(&TaskFilters {
            status: Some(status),
            ..TaskFilters::default()
        })
        .await
    }

    pub async fn pending_tasks(&self) -> DomainResult<Vec<Task>> {
        self.tasks_with_status(TaskStatus::Pending).await
    }

    pub async fn active_tasks(&self) -> DomainResult<Vec<Task>> {
        self.tasks_with_status(TaskStatus::InProgress).await
    }

    pub async fn completed_tasks(&self) -> DomainResult<Vec<Task>> {
        self.tasks_with_status(TaskStatus::Completed).await
    }

    pub async fn statistics(&self) -> DomainResult<TaskStatistics> {
        let tasks = self.tasks.list_all().await?;
        let mut by_status: BTreeMap<String, usize> =
            TaskStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let mut by_priority = BTreeMap::new();
        let mut by_agent = BTreeMap::new();

        for task in &tasks {
            *by_status.entry(task.status.as_str().to_string()).or_default() += 1;
            *by_priority.entry(task.priority.as_str().to_string()).or_default() += 1;
            *by_agent.entry(task.agent_id).or_default() += 1;
        }

        let total = tasks.len();
        let rate = |status: TaskStatus| {
            if total == 0 {
                0.0
            } else {
                by_status[status.as_str()] as f64 / total as f64
            }
        };
        let completion_rate = rate(TaskStatus::Completed);
        let failure_rate = rate(TaskStatus::Failed);

        Ok(TaskStatistics {
            total,
            by_status,
            by_priority,
            by_agent,
            completion_rate,
            failure_rate,
        })
    }

    /// Move a pending task to another existing agent.
    pub async fn assign_task_to_agent(&self, id: TaskId, agent_id: AgentId) -> DomainResult<Task> {
        self.require_agent(agent_id).await?;
        let mut task = self.require(id).await?;
        if task.status != TaskStatus::Pending {
            return Err(DomainError::ValidationFailed(format!(
                "only pending tasks can be reassigned; task {id} is {}",
                task.status
            )));
        }
        let previous = task.agent_id;
        let read = task.version;
        task.agent_id = agent_id;
        task.touch();
        if !self.tasks.save_if_version(&task, read).await? {
            return Err(DomainError::ConcurrencyConflict {
                entity: "task".to_string(),
                id: id.to_string(),
            });
        }
        tracing::info!(task_id = %id, from = %previous, to = %agent_id, "task reassigned");
        Ok(task)
    }

    /// In-progress tasks idle for longer than the stuck threshold.
    pub async fn monitor_task_execution(&self) -> DomainResult<Vec<StuckTask>> {
        let now = Utc::now();
        let threshold = i64::try_from(self.monitor.stuck_after_secs).unwrap_or(i64::MAX);
        let stuck: Vec<StuckTask> = self
            .active_tasks()
            .await?
            .into_iter()
            .filter_map(|task| {
                let idle_secs = (now - task.updated_at).num_seconds();
                (idle_secs > threshold).then(|| StuckTask {
                    task_id: task.id,
                    agent_id: task.agent_id,
                    name: task.name,
                    idle_secs,
                })
            })
            .collect();
        if !stuck.is_empty() {
            tracing::warn!(count = stuck.len(), "stuck tasks detected");
        }
        Ok(stuck)
    }
}
