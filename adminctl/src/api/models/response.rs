//! Success envelope shared by every JSON endpoint.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// `{"code": 0, "msg": "...", "data": ...}`. Errors use [`crate::errors::ErrorBody`] instead.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_message(data, "success")
    }

    pub fn with_message(data: T, msg: impl Into<String>) -> Self {
        Self {
            code: 0,
            msg: msg.into(),
            data,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::with_message((), msg)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
