//! # Transport Abstraction
//!
//! A duplex byte pipe to the daemon. The engine assumes nothing about
//! framing beyond what the codec imposes; a transport only has to hand
//! over a readable half and a writable half.
//!
//! The engine itself depends on the narrower [`MessageSource`] and
//! [`MessageSink`] seams, so tests can drive it without any transport
//! at all. [`crate::Connection::from_transport`] layers the PDU codec
//! over a transport's split halves.

use bser::Value;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;

use crate::error::Result;

pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An ordered byte pipe to the daemon.
///
/// Both halves must fail their pending operations once the peer goes
/// away, and dropping them must release the underlying resource even
/// if the streams have already failed.
pub trait Transport: Send {
    fn split(self: Box<Self>) -> (BoxReader, BoxWriter);
}

/// Yields decoded messages off the wire, one per call.
///
/// `Ok(None)` is a benign "no message" sentinel the receive loop skips
/// without consuming a correlation slot; end of stream and transport
/// failures are errors.
#[async_trait::async_trait]
pub trait MessageSource: Send {
    async fn next_message(&mut self) -> Result<Option<Value>>;
}

/// Accepts fully encoded messages for transmission.
#[async_trait::async_trait]
pub trait MessageSink: Send {
    async fn write_message(&mut self, bytes: &[u8]) -> Result<()>;

    /// Flushes and releases the write side. Safe to call after a
    /// write has already failed.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Unix domain socket transport to a daemon whose socket path is
/// already known. Discovering the path is the caller's concern.
#[cfg(unix)]
pub struct UnixTransport {
    stream: tokio::net::UnixStream,
}

#[cfg(unix)]
impl UnixTransport {
    pub async fn connect(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let stream = tokio::net::UnixStream::connect(path).await?;
        Ok(Self { stream })
    }
}

#[cfg(unix)]
impl Transport for UnixTransport {
    fn split(self: Box<Self>) -> (BoxReader, BoxWriter) {
        let (read, write) = self.stream.into_split();
        (Box::new(read), Box::new(write))
    }
}
