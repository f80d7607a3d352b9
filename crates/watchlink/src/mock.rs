//! Mock transports and engine seams for testing.
//!
//! These are used internally by the test suite and are not part of
//! the public API.

use std::sync::Arc;
use std::sync::Mutex;

use bser::Value;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::error::Result;
use crate::transport::BoxReader;
use crate::transport::BoxWriter;
use crate::transport::MessageSink;
use crate::transport::MessageSource;
use crate::transport::Transport;

/// In-memory duplex transport. Bytes written on one end are read on
/// the other, so a test can play the daemon's side of a connection.
pub struct DuplexTransport {
    stream: tokio::io::DuplexStream,
}

impl DuplexTransport {
    /// Creates a connected pair of transports.
    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (Self { stream: a }, Self { stream: b })
    }
}

impl Transport for DuplexTransport {
    fn split(self: Box<Self>) -> (BoxReader, BoxWriter) {
        let (read, write) = tokio::io::split(self.stream);
        (Box::new(read), Box::new(write))
    }
}

/// A [`MessageSource`] fed by hand, bypassing the codec entirely.
///
/// Push `Ok(Some(value))` to deliver a message, `Ok(None)` for the
/// benign no-message sentinel, or an error to simulate transport or
/// decode failure. Dropping the feeder reads as end of stream.
pub struct QueueSource {
    rx: mpsc::UnboundedReceiver<Result<Option<Value>>>,
}

impl QueueSource {
    pub fn channel() -> (mpsc::UnboundedSender<Result<Option<Value>>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait::async_trait]
impl MessageSource for QueueSource {
    async fn next_message(&mut self) -> Result<Option<Value>> {
        self.rx.recv().await.unwrap_or(Err(Error::Eof))
    }
}

/// A [`MessageSink`] that records every message written to it.
pub struct RecordingSink {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_writes: bool,
}

impl RecordingSink {
    pub fn new() -> (Arc<Mutex<Vec<Vec<u8>>>>, Self) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            written: written.clone(),
            fail_writes: false,
        };
        (written, sink)
    }

    /// A sink whose writes always fail, to exercise the write-side
    /// failure path.
    pub fn failing() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            fail_writes: true,
        }
    }
}

#[async_trait::async_trait]
impl MessageSink for RecordingSink {
    async fn write_message(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Transport("simulated write failure".into()));
        }
        self.written
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(bytes.to_vec());
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
