use std::path::PathBuf;

pub const DEFAULT_MAX_UPLOAD_MB: u64 = 10;
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Upload settings resolved once at startup.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory stored files are written into. Flat, no subdirectories.
    pub storage_path: PathBuf,
    /// Ceiling for the whole request body, in bytes.
    pub max_upload_size: u64,
}

impl UploadConfig {
    pub fn new(storage_path: impl Into<PathBuf>, max_upload_size: u64) -> Self {
        Self {
            storage_path: storage_path.into(),
            max_upload_size,
        }
    }

    pub fn with_max_megabytes(storage_path: impl Into<PathBuf>, max_upload_mb: u64) -> Self {
        Self::new(storage_path, megabytes_to_bytes(max_upload_mb))
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn ensure_storage_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.storage_path).await
    }
}

pub fn megabytes_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(BYTES_PER_MB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_megabytes_to_bytes() {
        assert_eq!(megabytes_to_bytes(DEFAULT_MAX_UPLOAD_MB), 10_485_760);
        assert_eq!(megabytes_to_bytes(u64::MAX), u64::MAX);
        let config = UploadConfig::with_max_megabytes("/tmp/uploads", 2);
        assert_eq!(config.max_upload_size, 2 * BYTES_PER_MB);
    }

    #[tokio::test]
    async fn creates_missing_storage_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = UploadConfig::new(tmp.path().join("nested").join("uploads"), 1024);
        config.ensure_storage_dir().await.unwrap();
        assert!(config.storage_path.is_dir());
        // Idempotent
        config.ensure_storage_dir().await.unwrap();
    }
}
