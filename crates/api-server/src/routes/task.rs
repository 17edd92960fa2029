//! Task API endpoints
//!
//! REST API for the task lifecycle under `/api/tasks`.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use tasklane_core::attachment::NewAttachment;
use tasklane_core::task::{Task, TaskFilter};
use tasklane_core::Error;

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    /// Id of the task to update
    pub primary: Uuid,
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
    pub attachment: Option<String>,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            text: task.text,
            completed: task.completed,
            attachment: task.attachment,
            created_at: task.created_at.to_rfc3339(),
            deleted_at: task.deleted_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrashResponse {
    pub message: String,
    pub task: TaskResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type RouteError = (StatusCode, Json<ErrorResponse>);

/// Body of a create request, either JSON or multipart with an optional file
pub struct CreateTaskInput {
    pub text: String,
    pub upload: Option<NewAttachment>,
}

impl<S> FromRequest<S> for CreateTaskInput
where
    S: Send + Sync,
{
    type Rejection = RouteError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(body) = Json::<CreateTaskRequest>::from_request(req, state)
                .await
                .map_err(|rejection| rejected(rejection.status(), rejection.body_text()))?;
            return Ok(Self {
                text: body.text.unwrap_or_default(),
                upload: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| rejected(rejection.status(), rejection.body_text()))?;

        let mut text = String::new();
        let mut upload = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| rejected(e.status(), e.body_text()))?
        {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("text") => {
                    text = field
                        .text()
                        .await
                        .map_err(|e| rejected(e.status(), e.body_text()))?;
                }
                Some("attachment") => {
                    let original_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| rejected(e.status(), e.body_text()))?;
                    // Browsers send an empty part when no file was picked
                    if !original_name.is_empty() || !bytes.is_empty() {
                        upload = Some(NewAttachment {
                            bytes,
                            original_name,
                            content_type,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(Self { text, upload })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/tasks/create - Create a task, optionally with an attachment
async fn create_task(
    State(state): State<AppState>,
    input: CreateTaskInput,
) -> Result<(StatusCode, Json<TaskResponse>), RouteError> {
    let created = state
        .service()
        .create(&input.text, input.upload)
        .await
        .map_err(|e| route_error(e, "Task not found"))?;

    Ok((StatusCode::CREATED, Json(TaskResponse::from(created))))
}

/// GET /api/tasks/view?status= - List tasks through a filter, newest first
async fn view_tasks(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<Vec<TaskResponse>>, RouteError> {
    let filter = match query.status.as_deref() {
        Some(raw) => raw
            .parse::<TaskFilter>()
            .map_err(|e| route_error(e, "Task not found"))?,
        None => TaskFilter::All,
    };
    list(&state, filter).await
}

/// GET /api/tasks/completed - List completed active tasks
async fn list_completed(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskResponse>>, RouteError> {
    list(&state, TaskFilter::Completed).await
}

async fn list(state: &AppState, filter: TaskFilter) -> Result<Json<Vec<TaskResponse>>, RouteError> {
    let tasks = state
        .service()
        .list(filter)
        .await
        .map_err(|e| route_error(e, "Task not found"))?;

    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// GET /api/tasks/file/{filename} - Stream a stored attachment
async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, RouteError> {
    let content = state
        .service()
        .open_attachment(&filename)
        .await
        .map_err(|e| route_error(e, "File not found"))?;

    let content_type = HeaderValue::from_str(&content.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let mut response = Body::from_stream(ReaderStream::new(content.file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content.length));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    let disposition = format!(
        "{}; filename=\"{}\"",
        disposition_type(&content.content_type),
        content.original_name.replace(['"', '\\'], "_")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// PATCH /api/tasks/status - Set the completed flag
async fn set_status(
    State(state): State<AppState>,
    payload: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, RouteError> {
    let Json(req) =
        payload.map_err(|rejection| rejected(rejection.status(), rejection.body_text()))?;

    let updated = state
        .service()
        .set_completed(req.primary, req.completed)
        .await
        .map_err(|e| route_error(e, "Task not found"))?;

    Ok(Json(TaskResponse::from(updated)))
}

/// PUT /api/tasks/{id} - Replace the task text
async fn update_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTextRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, RouteError> {
    let id = parse_id(&id)?;
    let Json(req) =
        payload.map_err(|rejection| rejected(rejection.status(), rejection.body_text()))?;

    let updated = state
        .service()
        .set_text(id, req.text.as_deref().unwrap_or_default())
        .await
        .map_err(|e| route_error(e, "Task not found"))?;

    Ok(Json(TaskResponse::from(updated)))
}

/// DELETE /api/tasks/delete/{id} - Move a task to the trash
async fn trash_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TrashResponse>, RouteError> {
    let id = parse_id(&id)?;

    let trashed = state
        .service()
        .soft_delete(id)
        .await
        .map_err(|e| route_error(e, "Task not found or already in trash"))?;

    Ok(Json(TrashResponse {
        message: "Task moved to trash".to_string(),
        task: TaskResponse::from(trashed),
    }))
}

/// PATCH /api/tasks/restore/{id} - Bring a task back from the trash
async fn restore_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, RouteError> {
    let id = parse_id(&id)?;

    let restored = state
        .service()
        .restore(id)
        .await
        .map_err(|e| route_error(e, "Task not found in trash"))?;

    Ok(Json(TaskResponse::from(restored)))
}

/// DELETE /api/tasks/permanent-delete/{id} - Destroy a trashed task
async fn purge_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, RouteError> {
    let id = parse_id(&id)?;

    state
        .service()
        .permanently_delete(id)
        .await
        .map_err(|e| route_error(e, "Task not found in trash"))?;

    Ok(Json(MessageResponse {
        message: "Task permanently deleted".to_string(),
    }))
}

// ============================================================================
// Router
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks/create", post(create_task))
        .route("/api/tasks/view", get(view_tasks))
        .route("/api/tasks/completed", get(list_completed))
        .route("/api/tasks/file/{filename}", get(get_file))
        .route("/api/tasks/status", patch(set_status))
        .route("/api/tasks/delete/{id}", delete(trash_task))
        .route("/api/tasks/restore/{id}", patch(restore_task))
        .route("/api/tasks/permanent-delete/{id}", delete(purge_task))
        .route("/api/tasks/{id}", put(update_text))
}

fn bad_request(message: impl Into<String>) -> RouteError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Extractor failures are the client's fault; an over-limit body keeps its 413
fn rejected(status: StatusCode, message: impl Into<String>) -> RouteError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        (
            status,
            Json(ErrorResponse {
                error: message.into(),
            }),
        )
    } else {
        bad_request(message)
    }
}

/// Only passive media render in the browser; anything else is downloaded
fn disposition_type(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let passive = matches!(
        essence.as_str(),
        "text/plain" | "image/png" | "image/jpeg" | "image/gif" | "image/webp" | "application/pdf"
    ) || essence.starts_with("audio/")
        || essence.starts_with("video/");
    if passive {
        "inline"
    } else {
        "attachment"
    }
}

fn not_found(message: impl Into<String>) -> RouteError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Ids that are not UUIDs can never match a task
fn parse_id(raw: &str) -> Result<Uuid, RouteError> {
    Uuid::parse_str(raw).map_err(|_| not_found("Task not found"))
}

/// Map a service failure to a response, hiding internal detail
fn route_error(error: Error, not_found_message: &str) -> RouteError {
    match error {
        Error::InvalidInput(message) => bad_request(message),
        e if e.is_not_found() => not_found(not_found_message),
        e => {
            tracing::error!(error = %e, "task request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error".to_string(),
                }),
            )
        }
    }
}
