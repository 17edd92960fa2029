//! Task model definitions

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Named view predicate selecting which tasks a read returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    /// Every active task
    #[default]
    All,
    /// Active tasks marked completed
    Completed,
    /// Active tasks not yet completed
    Incomplete,
    /// Soft-deleted tasks
    Trashed,
}

impl TaskFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Trashed => "trashed",
        }
    }

    /// Check whether a task belongs to this view
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::All => !task.is_trashed(),
            Self::Completed => !task.is_trashed() && task.completed,
            Self::Incomplete => !task.is_trashed() && !task.completed,
            Self::Trashed => task.is_trashed(),
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskFilter {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "completed" => Ok(Self::Completed),
            "incomplete" => Ok(Self::Incomplete),
            "trashed" => Ok(Self::Trashed),
            other => Err(Error::InvalidInput(format!("Unknown status filter: {}", other))),
        }
    }
}

/// A tracked task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new active task, validating and trimming its text
    pub fn new(text: &str) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            text: normalize_text(text)?,
            completed: false,
            attachment: None,
            created_at: Utc::now(),
            deleted_at: None,
        })
    }

    /// Set the attachment reference
    pub fn with_attachment(mut self, reference: impl Into<String>) -> Self {
        self.attachment = Some(reference.into());
        self
    }

    /// Whether the task sits in the trash
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Trim task text, rejecting blank input
pub fn normalize_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Task text is required".to_string()));
    }
    Ok(trimmed.to_string())
}
