//! File-based task storage implementation
//!
//! Stores the task collection as a JSON document on disk.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::model::{normalize_text, Task, TaskFilter};
use super::repository::TaskRepository;
use crate::{Error, Result};

/// File-based task store using JSON
///
/// Records are kept in insertion order. Each mutation holds the write lock
/// until the collection has been persisted, so a record is never observed
/// half-updated.
pub struct FileTaskStore {
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory copy of the collection
    tasks: RwLock<Vec<Task>>,
}

impl FileTaskStore {
    /// Open the store at the given path
    ///
    /// If the file doesn't exist, it will be created on first write.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tasks = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                Error::Storage(format!("Failed to read tasks file {}: {}", path.display(), e))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Storage(format!("Failed to parse tasks file {}: {}", path.display(), e))
            })?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            tasks: RwLock::new(tasks),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the collection to disk through a temp file and rename
    async fn persist(&self, tasks: &[Task]) -> Result<()> {
        let content = serde_json::to_string_pretty(tasks)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Apply a change to the single record matching `id` and `accept`
    async fn modify<F>(&self, id: Uuid, accept: fn(&Task) -> bool, apply: F) -> Result<Task>
    where
        F: FnOnce(&mut Task) + Send,
    {
        let mut tasks = self.tasks.write().await;
        let index = tasks
            .iter()
            .position(|t| t.id == id && accept(t))
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

        let previous = tasks[index].clone();
        apply(&mut tasks[index]);

        if let Err(err) = self.persist(&tasks).await {
            tasks[index] = previous;
            return Err(err);
        }
        Ok(tasks[index].clone())
    }
}

fn is_active(task: &Task) -> bool {
    !task.is_trashed()
}

fn is_trashed(task: &Task) -> bool {
    task.is_trashed()
}

#[async_trait]
impl TaskRepository for FileTaskStore {
    async fn create(&self, text: &str, attachment: Option<String>) -> Result<Task> {
        let mut task = Task::new(text)?;
        task.attachment = attachment;

        let mut tasks = self.tasks.write().await;
        tasks.push(task.clone());
        if let Err(err) = self.persist(&tasks).await {
            tasks.pop();
            return Err(err);
        }
        debug!(task_id = %task.id, "task created");
        Ok(task)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn find(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        // Walk newest insertions first so equal timestamps keep newest-first order
        let mut found: Vec<Task> = tasks
            .iter()
            .rev()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn set_completed(&self, id: Uuid, completed: bool) -> Result<Task> {
        self.modify(id, is_active, |t| t.completed = completed)
            .await
    }

    async fn set_text(&self, id: Uuid, text: &str) -> Result<Task> {
        let text = normalize_text(text)?;
        self.modify(id, is_active, move |t| t.text = text).await
    }

    async fn soft_delete(&self, id: Uuid) -> Result<Task> {
        let now = Utc::now();
        self.modify(id, is_active, move |t| t.deleted_at = Some(now))
            .await
    }

    async fn restore(&self, id: Uuid) -> Result<Task> {
        self.modify(id, is_trashed, |t| t.deleted_at = None).await
    }

    async fn permanently_delete(&self, id: Uuid) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let index = tasks
            .iter()
            .position(|t| t.id == id && t.is_trashed())
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

        let removed = tasks.remove(index);
        if let Err(err) = self.persist(&tasks).await {
            tasks.insert(index, removed);
            return Err(err);
        }
        debug!(task_id = %id, "task permanently deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (FileTaskStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");
        let store = FileTaskStore::new(&path).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_create_task() {
        let (store, _temp) = create_test_store().await;

        let created = store
            .create("  Test task ", Some("uploads/1-notes.txt".to_string()))
            .await
            .unwrap();

        assert_eq!(created.text, "Test task");
        assert!(!created.completed);
        assert_eq!(created.attachment.as_deref(), Some("uploads/1-notes.txt"));
        assert!(created.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_create_blank_text_persists_nothing() {
        let (store, _temp) = create_test_store().await;

        let result = store.create("   ", None).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(store.find(TaskFilter::All).await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_find_all_newest_first() {
        let (store, _temp) = create_test_store().await;

        let first = store.create("Task 1", None).await.unwrap();
        let second = store.create("Task 2", None).await.unwrap();
        let third = store.create("Task 3", None).await.unwrap();

        let tasks = store.find(TaskFilter::All).await.unwrap();
        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn test_filters_partition_tasks() {
        let (store, _temp) = create_test_store().await;

        let open = store.create("open", None).await.unwrap();
        let done = store.create("done", None).await.unwrap();
        let binned = store.create("binned", None).await.unwrap();
        store.set_completed(done.id, true).await.unwrap();
        store.soft_delete(binned.id).await.unwrap();

        let completed = store.find(TaskFilter::Completed).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, done.id);

        let incomplete = store.find(TaskFilter::Incomplete).await.unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].id, open.id);

        let trashed = store.find(TaskFilter::Trashed).await.unwrap();
        assert_eq!(trashed.len(), 1);
        assert_eq!(trashed[0].id, binned.id);

        assert_eq!(store.find(TaskFilter::All).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_set_text_keeps_identity() {
        let (store, _temp) = create_test_store().await;

        let task = store.create("Buy milk", None).await.unwrap();
        let updated = store.set_text(task.id, "Buy oat milk").await.unwrap();

        assert_eq!(updated.id, task.id);
        assert_eq!(updated.created_at, task.created_at);
        assert_eq!(updated.text, "Buy oat milk");

        let result = store.set_text(task.id, "  ").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        let retrieved = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(retrieved.text, "Buy oat milk");
    }

    #[tokio::test]
    async fn test_set_completed_unknown_task() {
        let (store, _temp) = create_test_store().await;
        let task = store.create("Only task", None).await.unwrap();

        let result = store.set_completed(Uuid::new_v4(), true).await;
        match result.unwrap_err() {
            Error::TaskNotFound(_) => {}
            e => panic!("Expected TaskNotFound error, got: {:?}", e),
        }

        let retrieved = store.get(task.id).await.unwrap().unwrap();
        assert!(!retrieved.completed);
    }

    #[tokio::test]
    async fn test_trashed_task_rejects_edits() {
        let (store, _temp) = create_test_store().await;
        let task = store.create("Trash me", None).await.unwrap();
        store.soft_delete(task.id).await.unwrap();

        assert!(store.set_completed(task.id, true).await.is_err());
        assert!(store.set_text(task.id, "changed").await.is_err());
        assert!(matches!(
            store.soft_delete(task.id).await,
            Err(Error::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let (store, _temp) = create_test_store().await;
        let task = store.create("Round trip", None).await.unwrap();

        let trashed = store.soft_delete(task.id).await.unwrap();
        assert!(trashed.deleted_at.is_some());
        assert!(store.find(TaskFilter::All).await.unwrap().is_empty());
        assert!(store.find(TaskFilter::Incomplete).await.unwrap().is_empty());

        let restored = store.restore(task.id).await.unwrap();
        assert_eq!(restored, task);
        assert!(store.find(TaskFilter::Trashed).await.unwrap().is_empty());

        assert!(matches!(
            store.restore(task.id).await,
            Err(Error::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_permanently_delete_requires_trash() {
        let (store, _temp) = create_test_store().await;
        let task = store.create("Keep me", None).await.unwrap();

        assert!(matches!(
            store.permanently_delete(task.id).await,
            Err(Error::TaskNotFound(_))
        ));
        assert_eq!(store.get(task.id).await.unwrap(), Some(task.clone()));

        store.soft_delete(task.id).await.unwrap();
        let removed = store.permanently_delete(task.id).await.unwrap();
        assert_eq!(removed.id, task.id);
        assert!(store.get(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");

        let task_id;
        {
            let store = FileTaskStore::new(&path).await.unwrap();
            let task = store.create("Persistent task", None).await.unwrap();
            task_id = task.id;
            store.set_completed(task_id, true).await.unwrap();
        }

        {
            let store = FileTaskStore::new(&path).await.unwrap();
            let task = store.get(task_id).await.unwrap().unwrap();
            assert_eq!(task.text, "Persistent task");
            assert!(task.completed);
        }
    }

    #[tokio::test]
    async fn test_malformed_file_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        match FileTaskStore::new(&path).await {
            Err(Error::Storage(msg)) => assert!(msg.contains("parse")),
            Err(e) => panic!("Expected Storage error, got: {:?}", e),
            Ok(_) => panic!("Expected Storage error"),
        }
    }
}
