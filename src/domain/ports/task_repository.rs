use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentId, Task, TaskId, TaskPriority, TaskStatus};

/// Filters for querying tasks
#[derive(Default, Debug, Clone)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub agent_id: Option<AgentId>,
    pub priority: Option<TaskPriority>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl TaskFilters {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self.agent_id.is_none_or(|a| task.agent_id == a)
            && self.priority.is_none_or(|p| task.priority == p)
    }
}

/// Repository port for task persistence operations
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert or overwrite a task
    async fn save(&self, task: &Task) -> DomainResult<()>;

    /// Overwrite a task only if the stored copy is still at `expected` version.
    ///
    /// Returns `false` without writing when the stored version differs or the
    /// task is not stored at all.
    async fn save_if_version(&self, task: &Task, expected: u64) -> DomainResult<bool>;

    /// Get a task by ID
    async fn get_by_id(&self, id: TaskId) -> DomainResult<Option<Task>>;

    /// All tasks, oldest first
    async fn list_all(&self) -> DomainResult<Vec<Task>>;

    /// Delete a task by ID, returning whether it existed
    async fn delete(&self, id: TaskId) -> DomainResult<bool>;

    /// Delete a task only if the stored copy is still at `expected` version
    async fn delete_if_version(&self, id: TaskId, expected: u64) -> DomainResult<bool>;

    /// Tasks matching the filters, oldest first, after offset/limit
    async fn find_by_criteria(&self, filters: &TaskFilters) -> DomainResult<Vec<Task>>;
}
