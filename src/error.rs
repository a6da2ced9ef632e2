//! HTTP error taxonomy and the single translator from store failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::db::StoreError;
use crate::response::{error_response, ErrorPayload};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("One or more employees were not found")]
    InvalidEmployee,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body exceeds the size limit")]
    PayloadTooLarge,

    /// Logged in full, never sent to the client.
    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>, details: Option<Value>) -> Self {
        AppError::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidEmployee => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidEmployee => "INVALID_EMPLOYEE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            AppError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::not_found(what),
            StoreError::InvalidEmployee => AppError::InvalidEmployee,
            StoreError::Conflict(message) => AppError::Conflict(message),
            StoreError::Database(sqlx::Error::RowNotFound) => {
                AppError::NotFound("Record not found".to_string())
            }
            StoreError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                AppError::Conflict("Record already exists".to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();
        let (message, details) = match self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                ("Unexpected error".to_string(), None)
            }
            AppError::Validation { message, details } => (message, details),
            other => (other.to_string(), None),
        };

        error_response(
            status,
            ErrorPayload {
                code,
                message,
                details,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        assert_eq!(
            AppError::from(StoreError::NotFound("Event")).to_string(),
            "Event not found"
        );
        assert_eq!(AppError::from(StoreError::InvalidEmployee).code(), "INVALID_EMPLOYEE");
        assert_eq!(
            AppError::from(StoreError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(StoreError::Database(sqlx::Error::RowNotFound)).code(),
            "NOT_FOUND"
        );
        assert_eq!(
            AppError::from(StoreError::Database(sqlx::Error::PoolTimedOut)).code(),
            "INTERNAL_SERVER_ERROR"
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (status, body) = body_of(AppError::Internal("connection refused".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
        assert!(!body.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_validation_error_carries_details() {
        let details = serde_json::json!({ "formErrors": [], "fieldErrors": { "title": ["Required"] } });
        let (status, body) =
            body_of(AppError::validation("Invalid request", Some(details.clone()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"], details);
    }

    #[tokio::test]
    async fn test_invalid_employee_is_400() {
        let (status, body) = body_of(AppError::InvalidEmployee).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_EMPLOYEE");
        assert_eq!(body["error"]["message"], "One or more employees were not found");
    }
}
