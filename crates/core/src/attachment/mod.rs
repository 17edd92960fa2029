//! Attachment storage
//!
//! Two strategies are available: [`PathAttachmentStore`] keeps uploads as
//! plain files referenced by relative path, [`BlobAttachmentStore`] keeps them
//! in a bucket addressed by a generated name with a metadata index.

mod blob_store;
mod path_store;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

pub use blob_store::{BlobAttachmentStore, BlobMetadata};
pub use path_store::PathAttachmentStore;

use crate::{Error, Result};

/// Which attachment strategy a deployment runs with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttachmentMode {
    /// Uploads are rejected
    None,
    /// Files on disk referenced by relative path
    Path,
    /// Bucket of named blobs with metadata
    #[default]
    Blob,
}

impl AttachmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Path => "path",
            Self::Blob => "blob",
        }
    }
}

impl fmt::Display for AttachmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentMode {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "disabled" => Ok(Self::None),
            "path" | "file" => Ok(Self::Path),
            "blob" | "bucket" => Ok(Self::Blob),
            other => Err(Error::InvalidInput(format!("Unknown attachment mode: {}", other))),
        }
    }
}

/// An incoming upload, fully buffered
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub bytes: Bytes,
    pub original_name: String,
    pub content_type: String,
}

/// A stored attachment opened for reading
#[derive(Debug)]
pub struct AttachmentContent {
    pub file: tokio::fs::File,
    pub content_type: String,
    pub length: u64,
    pub original_name: String,
}

/// Storage capability for task attachments
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Persist an upload and return the reference to record on the task
    async fn store(&self, bytes: Bytes, original_name: &str, content_type: &str) -> Result<String>;

    /// Open a stored attachment by reference
    async fn retrieve(&self, reference: &str) -> Result<AttachmentContent>;

    /// Remove a stored attachment
    async fn delete(&self, reference: &str) -> Result<()>;
}

/// Reduce an uploaded filename to a safe single path component
pub(crate) fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Reject names that could escape the storage directory
pub(crate) fn checked_file_name(name: &str) -> Result<&str> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::AttachmentNotFound(name.to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\my file.txt"), "my_file.txt");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_checked_file_name() {
        assert!(checked_file_name("abc.png").is_ok());
        assert!(checked_file_name("../abc.png").is_err());
        assert!(checked_file_name("a/b.png").is_err());
        assert!(checked_file_name("").is_err());
        assert!(checked_file_name("..").is_err());
        assert!(checked_file_name("v1..2.txt").is_ok());
    }

    #[test]
    fn test_attachment_mode_parse() {
        assert_eq!("PATH".parse::<AttachmentMode>().unwrap(), AttachmentMode::Path);
        assert_eq!("none".parse::<AttachmentMode>().unwrap(), AttachmentMode::None);
        assert_eq!("blob".parse::<AttachmentMode>().unwrap(), AttachmentMode::Blob);
        assert!("s3".parse::<AttachmentMode>().is_err());
    }
}
