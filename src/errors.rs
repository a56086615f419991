use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::db::queries::is_overlap_rejection;
use crate::models::schedule::ScheduleError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        if is_overlap_rejection(&e) {
            AppError::Conflict("That time slot was just taken. Please pick another.".to_string())
        } else {
            AppError::Database(e)
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        let message = match rejection {
            JsonRejection::JsonDataError(_) => "Request body has a missing or wrongly typed field.",
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON.",
            JsonRejection::MissingJsonContentType(_) => {
                "Request body must be JSON (Content-Type: application/json)."
            }
            _ => "Request body could not be read.",
        };
        AppError::Validation(message.to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected query string");
        AppError::Validation("Invalid query parameters.".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized: wrong or missing admin password.".to_string(),
            ),
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "server misconfigured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error.".to_string(),
                )
            }
            AppError::Database(_) | AppError::Storage(_) => {
                tracing::error!(error = %self, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}
