//! Byte ceilings for inbound streams.
//!
//! [`BoundedReader`] wraps any [`AsyncRead`] (a request body, a socket, an
//! in-memory fixture) and fails the first read that takes the running total
//! past the ceiling. The failure is an `io::Error` carrying [`LimitExceeded`],
//! so it travels through `tokio::io` plumbing unchanged and can be told apart
//! from other I/O errors with [`is_limit_exceeded`].

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream exceeded the {limit} byte limit")]
pub struct LimitExceeded {
    pub limit: u64,
}

impl LimitExceeded {
    pub fn into_io_error(self) -> io::Error {
        io::Error::other(self)
    }
}

/// Whether `err` was raised because a byte ceiling was crossed.
pub fn is_limit_exceeded(err: &io::Error) -> bool {
    err.get_ref()
        .is_some_and(|inner| inner.is::<LimitExceeded>())
}

/// Reader that errors once more than `limit` bytes have been read through it.
#[derive(Debug)]
pub struct BoundedReader<R> {
    inner: R,
    limit: u64,
    consumed: u64,
}

impl<R> BoundedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            consumed: 0,
        }
    }

    /// Bytes handed out so far. Never exceeds the limit.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for BoundedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let limit = LimitExceeded { limit: this.limit };

        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let read = (buf.filled().len() - before) as u64;

        let total = this.consumed.saturating_add(read);
        if total > this.limit {
            // Don't hand out the bytes past the ceiling.
            buf.set_filled(before);
            return Poll::Ready(Err(limit.into_io_error()));
        }
        this.consumed = total;
        Poll::Ready(Ok(()))
    }
}
