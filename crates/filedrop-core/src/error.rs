use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    /// The body went past the configured ceiling.
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    /// Reading the inbound body failed (client disconnect, broken framing).
    #[error("failed to read upload body: {0}")]
    Body(#[source] io::Error),
    /// Creating or writing the destination file failed.
    #[error("failed to write {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
