//! Task Store
//!
//! The persistence contract the task tools are written against, plus the
//! in-memory and SQLite implementations.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryTaskStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{NewTask, Task, TaskFilter, TaskId, TaskPatch, UpdateOutcome};

/// Task store trait
///
/// Every method is a single-document operation; implementations provide
/// their own atomicity for each call.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task and return its assigned id
    async fn create(&self, task: NewTask) -> Result<TaskId>;

    /// At most `limit` tasks matching `filter`, oldest first
    async fn find(&self, filter: &TaskFilter, limit: usize) -> Result<Vec<Task>>;

    /// Apply `patch` to the task with id `id`.
    ///
    /// A malformed `id` fails with `StoreError::InvalidIdentifier` before the
    /// store is touched.
    async fn update(&self, id: &str, patch: TaskPatch) -> Result<UpdateOutcome>;

    /// Point lookup
    async fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Check if the store is reachable
    async fn health_check(&self) -> bool;

    /// Store name
    fn name(&self) -> &str;
}
