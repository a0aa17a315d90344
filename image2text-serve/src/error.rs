use std::time::Duration;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use image2text::{ErrorKind, Image2TextError};
use serde_json::json;

/// A failed request, rendered as `{"detail": ...}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    /// The pipeline rejected the request or failed.
    Pipeline(Image2TextError),
    /// The multipart body could not be read.
    Multipart(MultipartError),
    /// A form field has an invalid value.
    InvalidForm(String),
    /// The generation did not finish in time.
    Timeout(Duration),
    /// The generation task died.
    Internal(String),
}

impl From<Image2TextError> for ApiError {
    fn from(e: Image2TextError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

impl ApiError {
    /// The status code and message sent to the client.
    pub fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            ApiError::Pipeline(e) => match e.kind() {
                ErrorKind::EmptyInput => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
                ErrorKind::InvalidImage => (StatusCode::BAD_REQUEST, e.to_string()),
                ErrorKind::BackendUnavailable
                | ErrorKind::GenerationFailed
                | ErrorKind::PersistenceFailed => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Inference failed: {e}"),
                ),
            },
            ApiError::Multipart(e) => (e.status(), e.body_text()),
            ApiError::InvalidForm(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::Timeout(limit) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("Inference did not finish within {limit:?}"),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Inference failed: {msg}"),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            log::error!("{detail}");
        } else {
            log::warn!("{detail}");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
