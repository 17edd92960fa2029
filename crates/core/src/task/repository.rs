//! Task repository trait
//!
//! Defines the interface for task storage operations.

use async_trait::async_trait;
use uuid::Uuid;

use super::model::{Task, TaskFilter};
use crate::Result;

/// Repository interface for the task lifecycle
///
/// Every mutation touches exactly one record. Operations on active tasks fail
/// with `Error::TaskNotFound` when the task is missing or trashed.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task with the given text and optional attachment reference
    async fn create(&self, text: &str, attachment: Option<String>) -> Result<Task>;

    /// Get a task by ID, whatever its state
    async fn get(&self, id: Uuid) -> Result<Option<Task>>;

    /// Find tasks matching a filter, newest first
    async fn find(&self, filter: TaskFilter) -> Result<Vec<Task>>;

    /// Set the completed flag of an active task
    async fn set_completed(&self, id: Uuid, completed: bool) -> Result<Task>;

    /// Replace the text of an active task
    async fn set_text(&self, id: Uuid, text: &str) -> Result<Task>;

    /// Move an active task to the trash
    async fn soft_delete(&self, id: Uuid) -> Result<Task>;

    /// Bring a trashed task back
    async fn restore(&self, id: Uuid) -> Result<Task>;

    /// Remove a trashed task for good, returning the removed record
    async fn permanently_delete(&self, id: Uuid) -> Result<Task>;
}
