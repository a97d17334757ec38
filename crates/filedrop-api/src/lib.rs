use axum::{
    extract::DefaultBodyLimit,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, MethodRouter},
    Router,
};
use filedrop_core::AppState;

pub mod error;
pub mod routes;

use crate::error::ApiError;

/// Build the service router.
///
/// `GET` routes register `HEAD` explicitly, otherwise axum answers it with
/// the `GET` handler. The upload route carries a body limit equal to the configured ceiling, so
/// multipart parsing never reads past it.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_size).unwrap_or(usize::MAX);

    Router::new()
        .route("/", read_only(get(routes::index::index)))
        .route(
            "/upload",
            post(routes::files::upload_file)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/health", read_only(get(health)))
        .fallback(not_found)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Only `GET` is served; every other method, `HEAD` included, gets a 405.
fn read_only(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.head(method_not_allowed).fallback(method_not_allowed)
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "OK",
    )
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
