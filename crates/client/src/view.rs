//! Task list view state
//!
//! The view owns only the active filter and the row being edited. Every
//! mutation is followed by a full reload of the filtered list; local copies
//! are never patched.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use uuid::Uuid;

use tasklane_core::task::{Task, TaskFilter};

use crate::client::TaskApi;
use crate::error::{ClientError, Result};

/// Filters selectable in the list view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

impl From<ViewFilter> for TaskFilter {
    fn from(filter: ViewFilter) -> Self {
        match filter {
            ViewFilter::All => TaskFilter::All,
            ViewFilter::Completed => TaskFilter::Completed,
            ViewFilter::Incomplete => TaskFilter::Incomplete,
        }
    }
}

impl fmt::Display for ViewFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(TaskFilter::from(*self).as_str())
    }
}

impl FromStr for ViewFilter {
    type Err = ClientError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "completed" => Ok(Self::Completed),
            "incomplete" => Ok(Self::Incomplete),
            other => Err(ClientError::InvalidFilter(other.to_string())),
        }
    }
}

/// A row currently in edit mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    pub id: Uuid,
    pub draft: String,
}

pub struct TaskView<A> {
    api: A,
    filter: ViewFilter,
    tasks: Vec<Task>,
    editing: Option<EditState>,
}

impl<A: TaskApi> TaskView<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            filter: ViewFilter::default(),
            tasks: Vec::new(),
            editing: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn filter(&self) -> ViewFilter {
        self.filter
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn editing(&self) -> Option<&EditState> {
        self.editing.as_ref()
    }

    /// Fetch the list for the active filter
    pub async fn reload(&mut self) -> Result<&[Task]> {
        self.tasks = self.api.list(self.filter.into()).await?;
        Ok(&self.tasks)
    }

    pub async fn set_filter(&mut self, filter: ViewFilter) -> Result<&[Task]> {
        self.filter = filter;
        self.reload().await
    }

    /// Find a row by full id or unique id prefix
    pub fn find_row(&self, needle: &str) -> Result<&Task> {
        let needle = needle.trim().to_ascii_lowercase();
        let mut matches = self
            .tasks
            .iter()
            .filter(|t| !needle.is_empty() && t.id.to_string().starts_with(&needle));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task),
            _ => Err(ClientError::UnknownTask(needle)),
        }
    }

    pub async fn add(&mut self, text: &str, attachment: Option<&Path>) -> Result<Task> {
        let task = self.api.create(text, attachment).await?;
        self.reload().await?;
        Ok(task)
    }

    pub async fn set_completed(&mut self, id: Uuid, completed: bool) -> Result<Task> {
        let task = self.api.set_completed(id, completed).await?;
        self.reload().await?;
        Ok(task)
    }

    /// Flip the completed flag of a listed row
    pub async fn toggle(&mut self, id: Uuid) -> Result<Task> {
        let completed = self
            .tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.completed)
            .ok_or_else(|| ClientError::UnknownTask(id.to_string()))?;
        self.set_completed(id, !completed).await
    }

    /// Put a listed row into edit mode, seeding the draft with its text
    pub fn begin_edit(&mut self, id: Uuid) -> Result<()> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ClientError::UnknownTask(id.to_string()))?;
        self.editing = Some(EditState {
            id,
            draft: task.text.clone(),
        });
        Ok(())
    }

    pub fn update_draft(&mut self, text: impl Into<String>) -> Result<()> {
        let editing = self.editing.as_mut().ok_or(ClientError::NotEditing)?;
        editing.draft = text.into();
        Ok(())
    }

    /// Submit the draft, leave edit mode and reload
    ///
    /// Edit mode ends even when the server rejects the draft.
    pub async fn confirm_edit(&mut self) -> Result<Task> {
        let editing = self.editing.take().ok_or(ClientError::NotEditing)?;
        let result = self.api.update_text(editing.id, &editing.draft).await;
        self.reload().await?;
        result
    }

    /// Drop the draft and reload to discard any visual drift
    pub async fn cancel_edit(&mut self) -> Result<&[Task]> {
        self.editing = None;
        self.reload().await
    }

    pub async fn trash(&mut self, id: Uuid) -> Result<Task> {
        let task = self.api.trash(id).await?;
        if self.editing.as_ref().is_some_and(|e| e.id == id) {
            self.editing = None;
        }
        self.reload().await?;
        Ok(task)
    }

    /// Tasks currently in the trash
    pub async fn trashed(&self) -> Result<Vec<Task>> {
        self.api.list(TaskFilter::Trashed).await
    }

    pub async fn restore(&mut self, id: Uuid) -> Result<Task> {
        let task = self.api.restore(id).await?;
        self.reload().await?;
        Ok(task)
    }

    pub async fn purge(&mut self, id: Uuid) -> Result<()> {
        self.api.purge(id).await?;
        self.reload().await?;
        Ok(())
    }

    /// Render the current list, one line per row
    pub fn render(&self) -> Vec<String> {
        self.tasks
            .iter()
            .map(|task| match self.editing.as_ref() {
                Some(edit) if edit.id == task.id => {
                    format!("[edit] {} > {}", short_id(task.id), edit.draft)
                }
                _ => render_row(task),
            })
            .collect()
    }
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Render a single task without edit state
pub fn render_row(task: &Task) -> String {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let mut line = format!("{} {} {}", mark, short_id(task.id), task.text);
    if let Some(attachment) = task.attachment.as_deref() {
        line.push_str(&format!("  (attachment: {})", attachment));
    }
    if task.is_trashed() {
        line.push_str("  (trashed)");
    }
    line
}
