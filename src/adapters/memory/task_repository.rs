//! In-memory task store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskId, TaskStatus};
use crate::domain::ports::{TaskFilters, TaskRepository};

/// Task repository backed by a map keyed by task id.
///
/// Each instance owns its own map; there is no process-wide store.
#[derive(Default, Clone)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

fn oldest_first(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
    tasks
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save(&self, task: &Task) -> DomainResult<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn save_if_version(&self, task: &Task, expected: u64) -> DomainResult<bool> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(stored) if stored.version == expected => {
                *stored = task.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_by_id(&self, id: TaskId) -> DomainResult<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> DomainResult<Vec<Task>> {
        let tasks = self.tasks.read().await.values().cloned().collect();
        Ok(oldest_first(tasks))
    }

    async fn delete(&self, id: TaskId) -> DomainResult<bool> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }

    async fn delete_if_version(&self, id: TaskId, expected: u64) -> DomainResult<bool> {
        let mut tasks = self.tasks.write().await;
        if tasks.get(&id).is_some_and(|t| t.version == expected) {
            tasks.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn find_by_criteria(&self, filters: &TaskFilters) -> DomainResult<Vec<Task>> {
        let matching = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| filters.matches(t))
            .cloned()
            .collect();

        let limit = filters.limit.unwrap_or(usize::MAX);
        Ok(oldest_first(matching)
            .into_iter()
            .skip(filters.offset)
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AgentId, TaskPriority};

    fn task_for(agent: AgentId, priority: TaskPriority) -> Task {
        Task::new(agent, "t", "d").with_priority(priority)
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let repo = InMemoryTaskRepository::new();
        let task = task_for(AgentId::new(), TaskPriority::High);
        repo.save(&task).await.unwrap();

        let loaded = repo.get_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(loaded, task);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let repo = InMemoryTaskRepository::new();
        let task = task_for(AgentId::new(), TaskPriority::Low);
        repo.save(&task).await.unwrap();

        assert!(repo.delete(task.id).await.unwrap());
        assert!(!repo.delete(task.id).await.unwrap());
        assert!(repo.get_by_id(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_if_version_rejects_stale_writer() {
        let repo = InMemoryTaskRepository::new();
        let mut task = task_for(AgentId::new(), TaskPriority::Medium);
        repo.save(&task).await.unwrap();
        let read = task.version;

        // Someone else cancels the stored copy.
        let mut cancelled = task.clone();
        assert!(cancelled.cancel());
        repo.save(&cancelled).await.unwrap();

        task.start().unwrap();
        assert!(!repo.save_if_version(&task, read).await.unwrap());
        let stored = repo.get_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_save_if_version_rejects_edit_with_same_status() {
        let repo = InMemoryTaskRepository::new();
        let stale = task_for(AgentId::new(), TaskPriority::Medium);
        repo.save(&stale).await.unwrap();

        let mut edited = stale.clone();
        edited.name = "renamed".to_string();
        edited.touch();
        assert!(repo.save_if_version(&edited, stale.version).await.unwrap());

        // Still pending, but the stale copy no longer matches.
        let mut started = stale.clone();
        started.start().unwrap();
        assert!(!repo.save_if_version(&started, stale.version).await.unwrap());
        let stored = repo.get_by_id(stale.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_conditional_writes_ignore_unknown_task() {
        let repo = InMemoryTaskRepository::new();
        let task = task_for(AgentId::new(), TaskPriority::Medium);
        assert!(!repo.save_if_version(&task, task.version).await.unwrap());
        assert!(!repo.delete_if_version(task.id, task.version).await.unwrap());
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_if_version_keeps_changed_task() {
        let repo = InMemoryTaskRepository::new();
        let mut task = task_for(AgentId::new(), TaskPriority::Low);
        repo.save(&task).await.unwrap();
        let read = task.version;

        task.start().unwrap();
        repo.save(&task).await.unwrap();
        assert!(!repo.delete_if_version(task.id, read).await.unwrap());
        assert!(repo.delete_if_version(task.id, task.version).await.unwrap());
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_find_by_criteria_filters_and_pages() {
        let repo = InMemoryTaskRepository::new();
        let a = AgentId::new();
        let b = AgentId::new();
        for _ in 0..3 {
            repo.save(&task_for(a, TaskPriority::High)).await.unwrap();
        }
        repo.save(&task_for(a, TaskPriority::Low)).await.unwrap();
        repo.save(&task_for(b, TaskPriority::High)).await.unwrap();

        let by_agent = TaskFilters {
            agent_id: Some(a),
            ..Default::default()
        };
        assert_eq!(repo.find_by_criteria(&by_agent).await.unwrap().len(), 4);

        let high_for_a = TaskFilters {
            agent_id: Some(a),
            priority: Some(TaskPriority::High),
            ..Default::default()
        };
        assert_eq!(repo.find_by_criteria(&high_for_a).await.unwrap().len(), 3);

        let paged = TaskFilters {
            agent_id: Some(a),
            limit: Some(2),
            offset: 3,
            ..Default::default()
        };
        assert_eq!(repo.find_by_criteria(&paged).await.unwrap().len(), 1);

        let pending = TaskFilters {
            status: Some(TaskStatus::Pending),
            ..Default::default()
        };
        assert_eq!(repo.find_by_criteria(&pending).await.unwrap().len(), 5);
    }
}
