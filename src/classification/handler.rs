//! HTTP handlers for the Classification API
//!
//! - POST   /api/v1/classification/sessions                     run a classification session
//! - GET    /api/v1/classification/sessions                     list session ids
//! - GET    /api/v1/classification/sessions/:id                 session report
//! - DELETE /api/v1/classification/sessions/:id                 drop a session and its stored AI results
//! - GET    /api/v1/classification/sessions/:id/review-queue    verdicts awaiting review
//! - POST   /api/v1/classification/sessions/:id/reviews         apply a human verdict
//! - GET    /api/v1/classification/sessions/:id/changes         review change log

use crate::classification::types::Label;
use crate::engine::{ClassificationEngine, ClassificationRequest};
use crate::error::Error;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for classification handlers
#[derive(Clone)]
pub struct ClassificationState {
    pub engine: Arc<ClassificationEngine>,
}

/// Create the classification router
pub fn classification_router(state: ClassificationState) -> Router {
    Router::new()
        .route(
            "/api/v1/classification/sessions",
            post(create_session).get(list_sessions),
        )
        .route(
            "/api/v1/classification/sessions/:id",
            get(get_session).delete(delete_session),
        )
        .route(
            "/api/v1/classification/sessions/:id/review-queue",
            get(review_queue),
        )
        .route("/api/v1/classification/sessions/:id/reviews", post(apply_review))
        .route("/api/v1/classification/sessions/:id/changes", get(list_changes))
        .with_state(state)
}

// =============================================================================
// Request / Response types
// =============================================================================

/// Request body for applying a review
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub field_key: String,
    pub new_classification: Label,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

/// Engine error mapped onto an HTTP status
struct HandlerError(Error);

impl From<Error> for HandlerError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for HandlerError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            Error::Session(_) | Error::UnknownField { .. } => {
                (StatusCode::NOT_FOUND, ApiError::not_found(self.0.to_string()))
            }
            err if err.is_client_error() => {
                (StatusCode::BAD_REQUEST, ApiError::bad_request(err.to_string()))
            }
            err => {
                tracing::error!("Classification request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::internal(err.to_string()),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

type HandlerResult<T> = std::result::Result<T, HandlerError>;

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/v1/classification/sessions
async fn create_session(
    State(state): State<ClassificationState>,
    payload: std::result::Result<Json<ClassificationRequest>, JsonRejection>,
) -> HandlerResult<impl IntoResponse> {
    let Json(request) = payload?;
    let report = state.engine.classify(request).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/v1/classification/sessions
async fn list_sessions(State(state): State<ClassificationState>) -> impl IntoResponse {
    Json(state.engine.list_sessions().await)
}

/// GET /api/v1/classification/sessions/:id
async fn get_session(
    State(state): State<ClassificationState>,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    Ok(Json(state.engine.report(&id).await?))
}

/// DELETE /api/v1/classification/sessions/:id
async fn delete_session(
    State(state): State<ClassificationState>,
    Path(id): Path<String>,
) -> HandlerResult<StatusCode> {
    state.engine.remove_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/classification/sessions/:id/review-queue
async fn review_queue(
    State(state): State<ClassificationState>,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    Ok(Json(state.engine.review_queue(&id).await?))
}

/// POST /api/v1/classification/sessions/:id/reviews
async fn apply_review(
    State(state): State<ClassificationState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<ReviewRequest>, JsonRejection>,
) -> HandlerResult<impl IntoResponse> {
    let Json(review) = payload?;
    let outcome = state
        .engine
        .apply_review(&id, &review.field_key, review.new_classification)
        .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/classification/sessions/:id/changes
async fn list_changes(
    State(state): State<ClassificationState>,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    Ok(Json(state.engine.changes(&id).await?))
}
