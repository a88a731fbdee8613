//! In-Memory Task Store
//!
//! Process-local store for tests and single-instance deployments. Tasks are
//! lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::TaskStore;
use crate::error::Result;
use crate::model::{NewTask, Task, TaskFilter, TaskId, TaskPatch, UpdateOutcome};

/// Task store backed by a vector behind an async lock
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: NewTask) -> Result<TaskId> {
        let id = TaskId::new();
        let task = Task::from_new(id, task, Utc::now());
        self.tasks.write().await.push(task);
        Ok(id)
    }

    async fn find(&self, filter: &TaskFilter, limit: usize) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .filter(|t| filter.matches(t))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<UpdateOutcome> {
        let id = TaskId::parse(id)?;

        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(UpdateOutcome::NOT_FOUND);
        };

        let before = task.clone();
        patch.apply(task, Utc::now());

        Ok(UpdateOutcome {
            matched: true,
            modified: *task != before,
        })
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.iter().find(|t| t.id == *id).cloned())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "memory"
    }
}
