//! Uniform response envelope: `{ok: true, data}` or `{ok: false, error}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub ok: bool,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: ErrorPayload,
}

/// Successful envelope with an explicit status code.
pub struct ApiSuccess<T> {
    status: StatusCode,
    data: T,
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(SuccessResponse {
                ok: true,
                data: self.data,
            }),
        )
            .into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> ApiSuccess<T> {
    ApiSuccess {
        status: StatusCode::OK,
        data,
    }
}

pub fn created<T: Serialize>(data: T) -> ApiSuccess<T> {
    ApiSuccess {
        status: StatusCode::CREATED,
        data,
    }
}

pub fn error_response(status: StatusCode, error: ErrorPayload) -> Response {
    (status, Json(ErrorResponse { ok: false, error })).into_response()
}

/// `{id}` body returned by delete endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedId {
    pub id: String,
}
