//! Task service
//!
//! Combines the task store with the configured attachment store so callers
//! never have to sequence the two themselves.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::attachment::{AttachmentContent, AttachmentStore, NewAttachment};
use crate::task::{normalize_text, Task, TaskFilter, TaskRepository};
use crate::{Error, Result};

#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskRepository>,
    attachments: Option<Arc<dyn AttachmentStore>>,
    /// Held across trash, restore and purge so a purge's check, cascade and
    /// removal cannot interleave with another lifecycle change
    lifecycle: Arc<Mutex<()>>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attachments: Option<Arc<dyn AttachmentStore>>,
    ) -> Self {
        Self {
            tasks,
            attachments,
            lifecycle: Arc::new(Mutex::new(())),
        }
    }

    /// Whether uploads are accepted
    pub fn attachments_enabled(&self) -> bool {
        self.attachments.is_some()
    }

    /// Create a task, storing its upload first when one is given
    ///
    /// Text is validated before any bytes are written, and a stored upload is
    /// removed again if the record cannot be created.
    pub async fn create(&self, text: &str, upload: Option<NewAttachment>) -> Result<Task> {
        let text = normalize_text(text)?;

        let Some(upload) = upload else {
            return self.tasks.create(&text, None).await;
        };
        let store = self.attachments.as_ref().ok_or_else(|| {
            Error::InvalidInput("Attachments are disabled on this server".to_string())
        })?;

        let reference = store
            .store(upload.bytes, &upload.original_name, &upload.content_type)
            .await?;

        match self.tasks.create(&text, Some(reference.clone())).await {
            Ok(task) => {
                info!(task_id = %task.id, attachment = %reference, "task created with attachment");
                Ok(task)
            }
            Err(err) => {
                if let Err(cleanup) = store.delete(&reference).await {
                    warn!(attachment = %reference, error = %cleanup, "failed to remove orphaned attachment");
                }
                Err(err)
            }
        }
    }

    pub async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        self.tasks.find(filter).await
    }

    pub async fn set_completed(&self, id: Uuid, completed: bool) -> Result<Task> {
        self.tasks.set_completed(id, completed).await
    }

    pub async fn set_text(&self, id: Uuid, text: &str) -> Result<Task> {
        self.tasks.set_text(id, text).await
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<Task> {
        let _guard = self.lifecycle.lock().await;
        self.tasks.soft_delete(id).await
    }

    pub async fn restore(&self, id: Uuid) -> Result<Task> {
        let _guard = self.lifecycle.lock().await;
        self.tasks.restore(id).await
    }

    /// Destroy a trashed task and its attachment
    ///
    /// The attachment goes first; if that fails the task stays in the trash.
    pub async fn permanently_delete(&self, id: Uuid) -> Result<Task> {
        let _guard = self.lifecycle.lock().await;
        let task = self
            .tasks
            .get(id)
            .await?
            .filter(Task::is_trashed)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

        if let Some(reference) = task.attachment.as_deref() {
            match self.attachments.as_ref() {
                Some(store) => store.delete(reference).await?,
                None => warn!(
                    task_id = %id,
                    attachment = %reference,
                    "attachments disabled, leaving stored attachment in place"
                ),
            }
        }

        let removed = self.tasks.permanently_delete(id).await?;
        info!(task_id = %id, "task permanently deleted");
        Ok(removed)
    }

    /// Open an attachment for streaming
    pub async fn open_attachment(&self, reference: &str) -> Result<AttachmentContent> {
        match self.attachments.as_ref() {
            Some(store) => store.retrieve(reference).await,
            None => Err(Error::AttachmentNotFound(reference.to_string())),
        }
    }
}
