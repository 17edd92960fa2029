//! Blob attachment strategy
//!
//! A bucket directory of randomly named blobs plus a `files.json` metadata
//! index recording content type, original filename, length and upload date.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{checked_file_name, sanitize_file_name, AttachmentContent, AttachmentStore};
use crate::{Error, Result};

const INDEX_FILE: &str = "files.json";

/// Metadata kept for every blob in the bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    pub filename: String,
    pub content_type: String,
    pub original_name: String,
    pub length: u64,
    pub upload_date: DateTime<Utc>,
}

pub struct BlobAttachmentStore {
    root: PathBuf,
    index: RwLock<HashMap<String, BlobMetadata>>,
}

impl BlobAttachmentStore {
    /// Open the bucket at `root`, loading its metadata index
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            Error::Storage(format!("Failed to create bucket dir {}: {}", root.display(), e))
        })?;

        let index_path = root.join(INDEX_FILE);
        let index = if tokio::fs::try_exists(&index_path).await? {
            let content = tokio::fs::read_to_string(&index_path).await.map_err(|e| {
                Error::Storage(format!("Failed to read bucket index: {}", e))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Storage(format!("Failed to parse bucket index: {}", e))
            })?
        } else {
            HashMap::new()
        };

        Ok(Self {
            root,
            index: RwLock::new(index),
        })
    }

    /// Look up the metadata of a blob
    pub async fn metadata(&self, name: &str) -> Option<BlobMetadata> {
        self.index.read().await.get(name).cloned()
    }

    async fn persist_index(&self, index: &HashMap<String, BlobMetadata>) -> Result<()> {
        let content = serde_json::to_string_pretty(index)?;
        let index_path = self.root.join(INDEX_FILE);
        let temp_path = index_path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &index_path).await?;
        Ok(())
    }

    fn generate_name(original_name: &str) -> String {
        let clean = sanitize_file_name(original_name);
        let stem = hex::encode(rand::random::<[u8; 16]>());
        match Path::new(&clean).extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}", stem, ext.to_ascii_lowercase()),
            None => stem,
        }
    }
}

#[async_trait]
impl AttachmentStore for BlobAttachmentStore {
    async fn store(&self, bytes: Bytes, original_name: &str, content_type: &str) -> Result<String> {
        let filename = Self::generate_name(original_name);
        let blob_path = self.root.join(&filename);

        tokio::fs::write(&blob_path, &bytes)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write blob: {}", e)))?;

        let metadata = BlobMetadata {
            filename: filename.clone(),
            content_type: content_type.to_string(),
            original_name: original_name.to_string(),
            length: bytes.len() as u64,
            upload_date: Utc::now(),
        };

        let mut index = self.index.write().await;
        index.insert(filename.clone(), metadata);
        if let Err(err) = self.persist_index(&index).await {
            index.remove(&filename);
            if let Err(cleanup) = tokio::fs::remove_file(&blob_path).await {
                warn!(file = %filename, error = %cleanup, "failed to remove unindexed blob");
            }
            return Err(err);
        }

        debug!(file = %filename, size = bytes.len(), "blob stored");
        Ok(filename)
    }

    async fn retrieve(&self, reference: &str) -> Result<AttachmentContent> {
        let name = checked_file_name(reference)?;
        let metadata = self
            .metadata(name)
            .await
            .ok_or_else(|| Error::AttachmentNotFound(reference.to_string()))?;

        let file = match tokio::fs::File::open(self.root.join(name)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::AttachmentNotFound(reference.to_string()))
            }
            Err(e) => return Err(Error::Storage(format!("Failed to open blob: {}", e))),
        };

        Ok(AttachmentContent {
            file,
            content_type: metadata.content_type,
            length: metadata.length,
            original_name: metadata.original_name,
        })
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        // Names this bucket never hands out, such as `uploads/...` references
        // written under the path strategy, have nothing here to remove
        let Ok(name) = checked_file_name(reference) else {
            warn!(reference = %reference, "not a blob reference, nothing to delete");
            return Ok(());
        };

        let mut index = self.index.write().await;
        if !index.contains_key(name) {
            return Err(Error::Storage(format!("No metadata for blob {}", reference)));
        }

        // Data first: the index entry must outlive any failed removal so the
        // delete can be retried
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(file = %name, "blob data already missing");
            }
            Err(e) => return Err(Error::Storage(format!("Failed to remove blob: {}", e))),
        }

        if let Some(metadata) = index.remove(name) {
            if let Err(err) = self.persist_index(&index).await {
                index.insert(name.to_string(), metadata);
                return Err(err);
            }
        }

        debug!(file = %name, "blob deleted");
        Ok(())
    }
}
