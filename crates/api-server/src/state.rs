//! Application state

use std::sync::Arc;

use tasklane_core::attachment::{
    AttachmentMode, AttachmentStore, BlobAttachmentStore, PathAttachmentStore,
};
use tasklane_core::service::TaskService;
use tasklane_core::task::FileTaskStore;

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    service: TaskService,
}

impl AppState {
    /// Open the stores under the configured data directory
    pub async fn new(config: ServerConfig) -> tasklane_core::Result<Self> {
        let tasks_path = config.data_dir.join("tasks.json");
        let task_store = Arc::new(FileTaskStore::new(tasks_path).await?);

        let attachments: Option<Arc<dyn AttachmentStore>> = match config.attachment_mode {
            AttachmentMode::None => None,
            AttachmentMode::Path => Some(Arc::new(
                PathAttachmentStore::new(config.data_dir.join("uploads")).await?,
            )),
            AttachmentMode::Blob => Some(Arc::new(
                BlobAttachmentStore::new(config.data_dir.join("blobs")).await?,
            )),
        };

        Ok(Self::with_service(config, TaskService::new(task_store, attachments)))
    }

    pub fn with_service(config: ServerConfig, service: TaskService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, service }),
        }
    }

    pub fn service(&self) -> &TaskService {
        &self.inner.service
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }
}
