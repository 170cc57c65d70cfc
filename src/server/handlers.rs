use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::routes::AppState;
use crate::error::TaskRelayError;

/// Inbound task, discriminated by `kind`. The closed set of variants is
/// the whole API surface; anything else fails to deserialize.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRequest {
    Qa {
        question: String,
        #[serde(default)]
        context: Option<String>,
    },
    LatestAnswer,
    ImageGeneration {
        prompt: String,
    },
    ContentGeneration {
        prompt: String,
        platform: String,
    },
}

#[derive(Serialize)]
pub struct TaskResponse {
    pub kind: &'static str,
    pub result: serde_json::Value,
}

/// Error payload: `{detail}` with the matching status code.
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

impl From<TaskRelayError> for ApiError {
    fn from(err: TaskRelayError) -> Self {
        match err {
            // Every tier failed, including the offline producer; the
            // composite message carries all accumulated diagnostics.
            TaskRelayError::Fallback(detail) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail,
            },
            other => {
                error!("task failed: {other}");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: "internal error".to_string(),
                }
            }
        }
    }
}

/// POST /ai-task — dispatch one task and return its result.
pub async fn handle_task(
    State(state): State<AppState>,
    payload: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, ApiError> {
    let Json(task) = payload.map_err(|e| ApiError::bad_request(format!("invalid task: {e}")))?;

    match task {
        TaskRequest::Qa { question, context } => {
            let answer = state
                .service
                .answer_question(&question, context.as_deref())
                .await?;
            Ok(Json(TaskResponse {
                kind: "qa",
                result: answer.into(),
            }))
        }
        TaskRequest::LatestAnswer => match state.service.latest_answer().await? {
            Some(latest) => Ok(Json(TaskResponse {
                kind: "latest_answer",
                result: serde_json::to_value(latest).map_err(TaskRelayError::Json)?,
            })),
            None => Err(ApiError::not_found("no previous answers found")),
        },
        TaskRequest::ImageGeneration { prompt } => {
            let image = state.service.generate_image(&prompt).await?;
            Ok(Json(TaskResponse {
                kind: "image_generation",
                result: image.into(),
            }))
        }
        TaskRequest::ContentGeneration { prompt, platform } => {
            let content = state.service.generate_content(&prompt, &platform).await?;
            Ok(Json(TaskResponse {
                kind: "content_generation",
                result: content.into(),
            }))
        }
    }
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}
