use axum::response::{Html, IntoResponse};
use rust_embed::RustEmbed;

use crate::error::ApiError;

#[derive(RustEmbed)]
#[folder = "static/"]
struct Assets;

const INDEX_PAGE: &str = "index.html";

/// `GET /`: the upload form.
pub async fn index() -> Result<impl IntoResponse, ApiError> {
    let page = Assets::get(INDEX_PAGE).ok_or_else(|| {
        tracing::error!("Embedded asset {} is missing", INDEX_PAGE);
        ApiError::Internal
    })?;
    Ok(Html(page.data))
}
