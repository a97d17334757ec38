use std::sync::Arc;

pub mod config;
pub mod error;
pub mod limit;
pub mod storage;

pub use config::UploadConfig;
pub use error::UploadError;

/// Shared state handed to every request handler.
///
/// Holds only configuration fixed at startup; uploads never share anything
/// else in memory.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<UploadConfig>,
}

impl AppState {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}
