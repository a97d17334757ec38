use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use filedrop_core::UploadError;
use thiserror::Error;

/// Errors returned to HTTP callers.
///
/// Bodies are short plain-text messages. Filesystem paths and I/O details are
/// logged here and never rendered.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("File too large")]
    PayloadTooLarge,
    #[error("Failed to save file")]
    Storage,
    #[error("Internal server error")]
    Internal,
}

pub const NO_FILE_PROVIDED: &str = "No file provided";
pub const FAILED_TO_PARSE_FORM: &str = "Failed to parse form";

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Storage | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { limit } => {
                tracing::info!(limit_bytes = limit, "Rejected upload over size limit");
                ApiError::PayloadTooLarge
            }
            UploadError::Body(e) => {
                tracing::warn!("Upload body could not be read: {}", e);
                ApiError::BadRequest(FAILED_TO_PARSE_FORM)
            }
            err @ UploadError::Storage { .. } => {
                tracing::error!("Failed to save upload: {}", err);
                ApiError::Storage
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            tracing::info!("Rejected multipart body over size limit");
            return ApiError::PayloadTooLarge;
        }
        tracing::warn!("Malformed multipart body: {}", err.body_text());
        ApiError::BadRequest(FAILED_TO_PARSE_FORM)
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        tracing::warn!("Rejected upload request: {}", rejection.body_text());
        ApiError::BadRequest(FAILED_TO_PARSE_FORM)
    }
}
