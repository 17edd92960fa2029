//! REST client for the task API

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use tasklane_core::task::{Task, TaskFilter};

use crate::error::{ClientError, Result};

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct StatusRequest {
    primary: Uuid,
    completed: bool,
}

#[derive(Deserialize)]
struct TrashResponse {
    task: Task,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Operations the task list needs from the server
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>>;

    async fn create(&self, text: &str, attachment: Option<&Path>) -> Result<Task>;

    async fn set_completed(&self, id: Uuid, completed: bool) -> Result<Task>;

    async fn update_text(&self, id: Uuid, text: &str) -> Result<Task>;

    async fn trash(&self, id: Uuid) -> Result<Task>;

    async fn restore(&self, id: Uuid) -> Result<Task>;

    async fn purge(&self, id: Uuid) -> Result<()>;
}

pub struct TaskClient {
    client: Client,
    url: String,
}

impl TaskClient {
    /// Create a client for a server root such as `http://localhost:5000`
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            client: Client::new(),
            url: format!("{}/api/tasks", url.trim_end_matches('/')),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Download an attachment into `dest`, returning the number of bytes written
    pub async fn download(&self, name: &str, dest: &Path) -> Result<u64> {
        let name = name.strip_prefix("uploads/").unwrap_or(name);
        let res = self
            .client
            .get(self.endpoint(&format!("/file/{}", urlencoding::encode(name))))
            .send()
            .await?;
        let res = check(res).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = res.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded {} bytes of {} to {}", written, name, dest.display());
        Ok(written)
    }
}

/// Turn error statuses into `ClientError::Api` with the server's message
async fn check(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T> {
    Ok(check(res).await?.json().await?)
}

#[async_trait]
impl TaskApi for TaskClient {
    async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let res = self
            .client
            .get(self.endpoint("/view"))
            .query(&[("status", filter.as_str())])
            .send()
            .await?;
        decode(res).await
    }

    async fn create(&self, text: &str, attachment: Option<&Path>) -> Result<Task> {
        let request = self.client.post(self.endpoint("/create"));
        let request = match attachment {
            None => request.json(&TextRequest { text }),
            Some(path) => {
                let bytes = tokio::fs::read(path).await?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string());
                let mime = mime_guess::from_path(path).first_or_octet_stream();
                let part = multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(mime.as_ref())?;
                let form = multipart::Form::new()
                    .text("text", text.to_string())
                    .part("attachment", part);
                request.multipart(form)
            }
        };
        decode(request.send().await?).await
    }

    async fn set_completed(&self, id: Uuid, completed: bool) -> Result<Task> {
        let res = self
            .client
            .patch(self.endpoint("/status"))
            .json(&StatusRequest {
                primary: id,
                completed,
            })
            .send()
            .await?;
        decode(res).await
    }

    async fn update_text(&self, id: Uuid, text: &str) -> Result<Task> {
        let res = self
            .client
            .put(self.endpoint(&format!("/{}", id)))
            .json(&TextRequest { text })
            .send()
            .await?;
        decode(res).await
    }

    async fn trash(&self, id: Uuid) -> Result<Task> {
        let res = self
            .client
            .delete(self.endpoint(&format!("/delete/{}", id)))
            .send()
            .await?;
        let body: TrashResponse = decode(res).await?;
        Ok(body.task)
    }

    async fn restore(&self, id: Uuid) -> Result<Task> {
        let res = self
            .client
            .patch(self.endpoint(&format!("/restore/{}", id)))
            .send()
            .await?;
        decode(res).await
    }

    async fn purge(&self, id: Uuid) -> Result<()> {
        let res = self
            .client
            .delete(self.endpoint(&format!("/permanent-delete/{}", id)))
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_api_prefix() {
        let client = TaskClient::new("http://localhost:5000/");
        assert_eq!(client.endpoint("/view"), "http://localhost:5000/api/tasks/view");
    }
}
