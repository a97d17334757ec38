use std::io;

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use filedrop_core::limit::LimitExceeded;
use filedrop_core::storage::{self, StoredFile};
use filedrop_core::AppState;
use filedrop_util::filename::UploadTimestamp;
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

use crate::error::{ApiError, NO_FILE_PROVIDED};

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// `POST /upload`: store the first `file` part of a multipart form.
///
/// The whole body must fit the configured ceiling. The file is only kept once
/// every remaining part has been read back within that ceiling.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = state.config.max_upload_size;

    // Early rejection if Content-Length exceeds the ceiling
    if let Some(content_length) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if content_length > limit {
            tracing::info!(content_length, limit_bytes = limit, "Rejected upload over size limit");
            return Err(ApiError::PayloadTooLarge);
        }
    }

    let mut multipart = multipart?;
    let mut stored: Option<StoredFile> = None;

    while let Some(field) = next_field(&mut multipart, stored.as_ref()).await? {
        if stored.is_none() && is_file_field(&field) {
            stored = Some(save_field(&state, field).await?);
        }
    }

    let stored = stored.ok_or(ApiError::BadRequest(NO_FILE_PROVIDED))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("File uploaded successfully: {}", stored.name),
    ))
}

fn is_file_field(field: &Field<'_>) -> bool {
    field.name() == Some(FILE_FIELD) && field.file_name().is_some_and(|name| !name.is_empty())
}

/// Advance to the next part. A failure here means the body as a whole is
/// rejected, so an already stored file is discarded.
async fn next_field<'a>(
    multipart: &'a mut Multipart,
    stored: Option<&StoredFile>,
) -> Result<Option<Field<'a>>, ApiError> {
    match multipart.next_field().await {
        Ok(field) => Ok(field),
        Err(err) => {
            if let Some(file) = stored {
                discard(file).await;
            }
            Err(err.into())
        }
    }
}

async fn save_field(state: &AppState, field: Field<'_>) -> Result<StoredFile, ApiError> {
    let raw_name = field.file_name().unwrap_or_default().to_string();
    let limit = state.config.max_upload_size;
    let body = StreamReader::new(Box::pin(
        field.map_err(move |err| body_read_error(err, limit)),
    ));

    let timestamp = UploadTimestamp::now();
    storage::store_upload(&state.config.storage_path, &timestamp, &raw_name, body, limit)
        .await
        .map_err(ApiError::from)
}

fn body_read_error(err: MultipartError, limit: u64) -> io::Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        LimitExceeded { limit }.into_io_error()
    } else {
        io::Error::other(err)
    }
}

async fn discard(file: &StoredFile) {
    if let Err(e) = tokio::fs::remove_file(&file.path).await {
        tracing::warn!(file = %file.name, "Failed to remove rejected upload: {}", e);
    }
}
