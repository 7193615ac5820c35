use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rusqlite::ErrorCode;
use serde_json::json;
use thiserror::Error;

/// Typed failures surfaced by every component operation.
#[derive(Error, Debug)]
pub enum CmsError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Unauthorized(String),
    #[error("Database error: {0}")]
    Persistence(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type CmsResult<T> = Result<T, CmsError>;

impl From<rusqlite::Error> for CmsError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                CmsError::Conflict(
                    msg.clone()
                        .unwrap_or_else(|| "A record with the same unique value already exists".to_string()),
                )
            }
            _ => CmsError::Persistence(e.to_string()),
        }
    }
}

impl From<r2d2::Error> for CmsError {
    fn from(e: r2d2::Error) -> Self {
        CmsError::Persistence(format!("connection pool: {}", e))
    }
}

impl From<bcrypt::BcryptError> for CmsError {
    fn from(e: bcrypt::BcryptError) -> Self {
        CmsError::Persistence(format!("password hashing: {}", e))
    }
}

impl From<std::io::Error> for CmsError {
    fn from(e: std::io::Error) -> Self {
        CmsError::Storage(e.to_string())
    }
}

impl ResponseError for CmsError {
    fn status_code(&self) -> StatusCode {
        match self {
            CmsError::Validation(_) | CmsError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            CmsError::NotFound(_) => StatusCode::NOT_FOUND,
            CmsError::Conflict(_) => StatusCode::CONFLICT,
            CmsError::InvalidCredentials | CmsError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CmsError::Unauthorized(_) => StatusCode::FORBIDDEN,
            CmsError::Persistence(_) | CmsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            CmsError::Persistence(detail) | CmsError::Storage(detail) => {
                log::error!("Request failed: {}", detail);
                "An internal error occurred.".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "success": false, "message": message }))
    }
}
