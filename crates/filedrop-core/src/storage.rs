use std::path::{Path, PathBuf};

use filedrop_util::filename::{stored_filename, UploadTimestamp};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::UploadError;
use crate::limit::{is_limit_exceeded, BoundedReader};

/// Size of the single buffer each upload is copied through.
pub const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// A file written by [`store_upload`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// `<timestamp>_<sanitized name>`, safe to show to the uploader.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Copy `body` into `dest`, failing once more than `limit` bytes arrive.
///
/// Memory use is one [`COPY_BUFFER_SIZE`] buffer regardless of `limit`.
/// Read failures are reported as [`UploadError::TooLarge`] or
/// [`UploadError::Body`]; write failures as [`UploadError::Storage`] naming
/// `dest_path`.
pub async fn accept<R, W>(
    body: R,
    limit: u64,
    dest: &mut W,
    dest_path: &Path,
) -> Result<u64, UploadError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BoundedReader::new(body, limit);
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if is_limit_exceeded(&e) => return Err(UploadError::TooLarge { limit }),
            Err(e) => return Err(UploadError::Body(e)),
        };
        dest.write_all(&buf[..n])
            .await
            .map_err(|source| UploadError::Storage {
                path: dest_path.to_path_buf(),
                source,
            })?;
        written += n as u64;
    }

    dest.flush().await.map_err(|source| UploadError::Storage {
        path: dest_path.to_path_buf(),
        source,
    })?;
    Ok(written)
}

/// Stream one upload into `dir` under its timestamped, sanitized name.
///
/// The destination is created before the body is read. If anything fails
/// after that, the partial file is removed so a rejected or interrupted upload
/// never leaves a truncated file behind.
pub async fn store_upload<R>(
    dir: &Path,
    timestamp: &UploadTimestamp,
    raw_name: &str,
    body: R,
    limit: u64,
) -> Result<StoredFile, UploadError>
where
    R: AsyncRead + Unpin,
{
    let name = stored_filename(timestamp, raw_name);
    let path = dir.join(&name);

    let mut file = fs::File::create(&path)
        .await
        .map_err(|source| UploadError::Storage {
            path: path.clone(),
            source,
        })?;

    let result = accept(body, limit, &mut file, &path).await;
    drop(file);

    match result {
        Ok(size) => {
            tracing::info!(file = %name, path = %path.display(), size_bytes = size, "File uploaded");
            Ok(StoredFile { name, path, size })
        }
        Err(err) => {
            if let Err(e) = fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), "Failed to remove partial upload: {}", e);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limit::LimitExceeded;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Yields `good` bytes, then fails with `err`.
    struct FailingReader {
        good: Vec<u8>,
        err: Option<io::Error>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if !self.good.is_empty() {
                let n = self.good.len().min(buf.remaining());
                let chunk: Vec<u8> = self.good.drain(..n).collect();
                buf.put_slice(&chunk);
                return Poll::Ready(Ok(()));
            }
            match self.err.take() {
                Some(e) => Poll::Ready(Err(e)),
                None => Poll::Ready(Ok(())),
            }
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn accept_copies_everything_under_the_limit() {
        let data = vec![42u8; COPY_BUFFER_SIZE * 3 + 17];
        let mut out = Vec::new();
        let n = accept(&data[..], data.len() as u64, &mut out, Path::new("out"))
            .await
            .unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn accept_rejects_oversized_body() {
        let data = vec![42u8; 1025];
        let mut out = Vec::new();
        let err = accept(&data[..], 1024, &mut out, Path::new("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { limit: 1024 }));
        assert!(out.len() <= 1024);
    }

    #[tokio::test]
    async fn accept_recognizes_limit_errors_from_upstream() {
        let reader = FailingReader {
            good: b"partial".to_vec(),
            err: Some(LimitExceeded { limit: 7 }.into_io_error()),
        };
        let mut out = Vec::new();
        let err = accept(reader, 1024, &mut out, Path::new("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { limit: 1024 }));
    }

    /// Accepts nothing.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::StorageFull, "disk full")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn accept_write_failure_names_the_destination() {
        let err = accept(&b"data"[..], 1024, &mut FullDisk, Path::new("/srv/out.bin"))
            .await
            .unwrap_err();
        match err {
            UploadError::Storage { path, source } => {
                assert_eq!(path, Path::new("/srv/out.bin"));
                assert_eq!(source.kind(), io::ErrorKind::StorageFull);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stores_file_under_timestamped_name() {
        let tmp = tempfile::tempdir().unwrap();
        let timestamp = UploadTimestamp::now();
        let stored = store_upload(tmp.path(), &timestamp, "../../test file.txt", &b"x"[..], 1024)
            .await
            .unwrap();

        assert_eq!(stored.name, format!("{}_test_file.txt", timestamp));
        assert_eq!(stored.size, 1);
        assert_eq!(stored.path, tmp.path().join(&stored.name));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"x");
    }

    #[tokio::test]
    async fn same_second_same_name_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let timestamp = UploadTimestamp::now();
        store_upload(tmp.path(), &timestamp, "a.txt", &b"first"[..], 1024)
            .await
            .unwrap();
        let second = store_upload(tmp.path(), &timestamp, "a.txt", &b"second"[..], 1024)
            .await
            .unwrap();
        assert_eq!(entries(tmp.path()).len(), 1);
        assert_eq!(std::fs::read(&second.path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn removes_partial_file_when_limit_is_exceeded() {
        let tmp = tempfile::tempdir().unwrap();
        let data = vec![0u8; COPY_BUFFER_SIZE * 2];
        let err = store_upload(tmp.path(), &UploadTimestamp::now(), "big.bin", &data[..], 100)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { .. }));
        assert!(entries(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn removes_partial_file_when_body_breaks() {
        let tmp = tempfile::tempdir().unwrap();
        let reader = FailingReader {
            good: vec![1u8; 300],
            err: Some(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        };
        let err = store_upload(tmp.path(), &UploadTimestamp::now(), "cut.bin", reader, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Body(_)));
        assert!(entries(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_a_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        let err = store_upload(&missing, &UploadTimestamp::now(), "a.txt", &b"x"[..], 1024)
            .await
            .unwrap_err();
        match err {
            UploadError::Storage { path, .. } => assert!(path.starts_with(&missing)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
