//! Referenced-file attachment strategy
//!
//! Uploads land in a content directory as `<unix-millis>-<name>` and tasks
//! record the relative path `uploads/<file>`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{checked_file_name, sanitize_file_name, AttachmentContent, AttachmentStore};
use crate::{Error, Result};

/// Prefix of every reference handed out by this store
pub const UPLOADS_PREFIX: &str = "uploads/";

pub struct PathAttachmentStore {
    root: PathBuf,
}

impl PathAttachmentStore {
    /// Open the store, creating its directory if needed
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            Error::Storage(format!("Failed to create uploads dir {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    /// Accept either a full reference or the bare filename
    fn file_name<'a>(&self, reference: &'a str) -> Result<&'a str> {
        checked_file_name(reference.strip_prefix(UPLOADS_PREFIX).unwrap_or(reference))
    }

    async fn write_new(&self, name: &str, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(name))
            .await?;
        file.write_all(bytes).await?;
        file.flush().await
    }
}

#[async_trait]
impl AttachmentStore for PathAttachmentStore {
    async fn store(&self, bytes: Bytes, original_name: &str, _content_type: &str) -> Result<String> {
        let clean = sanitize_file_name(original_name);
        let mut name = format!("{}-{}", Utc::now().timestamp_millis(), clean);

        if let Err(err) = self.write_new(&name, &bytes).await {
            if err.kind() != ErrorKind::AlreadyExists {
                return Err(Error::Storage(format!("Failed to write upload: {}", err)));
            }
            // Same millisecond and name: disambiguate once
            name = format!(
                "{}{:04x}-{}",
                Utc::now().timestamp_millis(),
                rand::random::<u16>(),
                clean
            );
            self.write_new(&name, &bytes)
                .await
                .map_err(|e| Error::Storage(format!("Failed to write upload: {}", e)))?;
        }

        debug!(file = %name, size = bytes.len(), "attachment stored on disk");
        Ok(format!("{}{}", UPLOADS_PREFIX, name))
    }

    async fn retrieve(&self, reference: &str) -> Result<AttachmentContent> {
        let name = self.file_name(reference)?;
        let path = self.root.join(name);

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::AttachmentNotFound(reference.to_string()))
            }
            Err(e) => return Err(Error::Storage(format!("Failed to open upload: {}", e))),
        };
        let length = file.metadata().await?.len();
        let original_name = name
            .split_once('-')
            .map(|(_, rest)| rest)
            .unwrap_or(name)
            .to_string();

        Ok(AttachmentContent {
            file,
            content_type: mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string(),
            length,
            original_name,
        })
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        let name = self.file_name(reference)?;
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => {
                debug!(file = %name, "attachment removed from disk");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to remove upload: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    async fn create_test_store() -> (PathAttachmentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = PathAttachmentStore::new(temp_dir.path().join("uploads"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let (store, _temp) = create_test_store().await;

        let reference = store
            .store(Bytes::from_static(b"hello"), "notes.txt", "text/plain")
            .await
            .unwrap();
        assert!(reference.starts_with(UPLOADS_PREFIX));
        assert!(reference.ends_with("-notes.txt"));

        let mut content = store.retrieve(&reference).await.unwrap();
        assert_eq!(content.content_type, "text/plain");
        assert_eq!(content.length, 5);
        assert_eq!(content.original_name, "notes.txt");
        let mut body = String::new();
        content.file.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "hello");

        // bare filename resolves too
        let bare = reference.strip_prefix(UPLOADS_PREFIX).unwrap();
        assert!(store.retrieve(bare).await.is_ok());
    }

    #[tokio::test]
    async fn test_same_name_does_not_overwrite() {
        let (store, _temp) = create_test_store().await;

        let first = store
            .store(Bytes::from_static(b"one"), "a.txt", "text/plain")
            .await
            .unwrap();
        let second = store
            .store(Bytes::from_static(b"two"), "a.txt", "text/plain")
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(store.retrieve(&first).await.unwrap().length, 3);
        assert_eq!(store.retrieve(&second).await.unwrap().length, 3);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _temp) = create_test_store().await;

        let reference = store
            .store(Bytes::from_static(b"bye"), "bye.txt", "text/plain")
            .await
            .unwrap();
        store.delete(&reference).await.unwrap();
        assert!(matches!(
            store.retrieve(&reference).await,
            Err(Error::AttachmentNotFound(_))
        ));
        store.delete(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_is_not_found() {
        let (store, _temp) = create_test_store().await;
        assert!(matches!(
            store.retrieve("uploads/../tasks.json").await,
            Err(Error::AttachmentNotFound(_))
        ));
    }
}
