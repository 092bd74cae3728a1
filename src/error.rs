//! Error taxonomy shared by the ingestion pipeline and the HTTP surface.

use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

/// The kinds of failure described in the error handling design: validation,
/// not-found, auth, conflict, delivery, and transient storage errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Truncate a channel delivery error message to the 500-character bound
    /// the notification log stores.
    pub fn truncate_message(msg: impl AsRef<str>) -> String {
        let msg = msg.as_ref();
        if msg.len() <= 500 {
            msg.to_string()
        } else {
            msg.chars().take(500).collect()
        }
    }
}

#[derive(Serialize)]
struct DetailBody {
    detail: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(DetailBody {
            detail: self.to_string(),
        })
    }
}

pub type AppResult<T> = Result<T, AppError>;
