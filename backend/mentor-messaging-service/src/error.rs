use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal server error")]
    Internal,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
            StoreError::NotFound => AppError::NotFound,
            // Only the thread registry can lose a uniqueness race, and it handles it.
            StoreError::Conflict => AppError::Internal,
            StoreError::Corrupt(msg) => {
                tracing::error!(error = %msg, "store returned a row that failed validation");
                AppError::Internal
            }
        }
    }
}

impl AppError {
    /// Whether the caller may safely retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            AppError::StoreUnavailable(_) => true,
            _ => false,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::NotFound => 404,
            AppError::StoreUnavailable(_) => 503,
            AppError::Database(_) if self.is_retryable() => 503,
            AppError::Config(_) | AppError::Database(_) | AppError::Internal => 500,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::BadRequest(_) => "INVALID_REQUEST",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound => "NOT_FOUND",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::Internal => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to show to a client; internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal | AppError::Config(_) => {
                "internal server error".to_string()
            }
            AppError::StoreUnavailable(_) => "store unavailable, try again later".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        if AppError::status_code(self) >= 500 {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(ResponseError::status_code(self)).json(ErrorBody {
            success: false,
            error: self.public_message(),
            code: self.code(),
            retryable: self.is_retryable(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(AppError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(AppError::Unauthorized.status_code(), 401);
        assert_eq!(AppError::Forbidden.status_code(), 403);
        assert_eq!(AppError::NotFound.status_code(), 404);
        assert_eq!(AppError::StoreUnavailable("down".into()).status_code(), 503);
        assert_eq!(AppError::Internal.status_code(), 500);
    }

    #[test]
    fn pool_timeouts_are_retryable() {
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(AppError::StoreUnavailable("down".into()).is_retryable());
        assert!(!AppError::Database(sqlx::Error::RowNotFound).is_retryable());
        assert!(!AppError::NotFound.is_retryable());
    }

    #[test]
    fn store_errors_map_to_app_errors() {
        let err: AppError = StoreError::Unavailable("io".into()).into();
        assert!(matches!(err, AppError::StoreUnavailable(_)));

        let err: AppError = StoreError::Database(sqlx::Error::PoolClosed).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn database_details_are_not_leaked() {
        let err = AppError::Database(sqlx::Error::Protocol("secret detail".into()));
        assert!(!err.public_message().contains("secret"));
    }
}
