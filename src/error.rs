use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The actor lacks admin rights for the attempted operation.
    #[error("user `{user_id}` is not allowed to administer games")]
    Unauthorized {
        /// Identity that attempted the operation.
        user_id: i64,
    },
    /// No game matched the request.
    #[error("no matching game found")]
    GameNotFound,
    /// A non-reset game already exists for the chat.
    #[error("chat `{chat_id}` already has a game")]
    GameAlreadyOpen {
        /// Chat that already hosts a game.
        chat_id: i64,
    },
    /// The member is already registered in the game.
    #[error("`{display_name}` already joined this game")]
    AlreadyJoined {
        /// Label of the already-registered member.
        display_name: String,
    },
    /// Registration closed on a game nobody joined.
    #[error("the game has no participants to pair")]
    NoParticipants,
    /// The inbound command could not be parsed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized { .. } => AppError::Unauthorized(err.to_string()),
            ServiceError::GameNotFound => AppError::NotFound(err.to_string()),
            ServiceError::GameAlreadyOpen { .. }
            | ServiceError::AlreadyJoined { .. }
            | ServiceError::NoParticipants => AppError::Conflict(err.to_string()),
            ServiceError::InvalidCommand(message) => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
