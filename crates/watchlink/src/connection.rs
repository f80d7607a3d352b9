//! # Connection Engine
//!
//! Multiplexes one transport into concurrent request/response
//! exchanges while demultiplexing unsolicited push messages to a
//! registered listener.
//!
//! Two tasks run per connection: a single-writer sender task draining
//! queued commands to the transport, and a receive loop matching each
//! incoming reply to the oldest pending request. The protocol carries
//! no request identifiers; replies arrive in the exact order their
//! requests were sent, and the correlation queue leans on that. Do not
//! add sequence numbers here without changing the daemon side too.
//!
//! Unilateral messages (subscription pushes, log lines) may interleave
//! between replies at any point; they are recognized by a configured
//! label set and never consume a correlation slot.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use bser::Value;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;

use crate::error::Error;
use crate::error::Result;
use crate::pdu::PduSink;
use crate::pdu::PduSource;
use crate::transport::MessageSink;
use crate::transport::MessageSource;
use crate::transport::Transport;

/// Invoked for every decoded message that matches the unilateral
/// label set.
pub type UnilateralCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Instrumentation checkpoints around one submitted command, so tests
/// can synchronize with the sender and receiver tasks. No effect on
/// protocol behavior.
pub trait CommandListener: Send + Sync {
    /// The sender task picked the command up.
    fn on_start(&self) {}
    /// The command's bytes were flushed to the transport.
    fn on_sent(&self) {}
    /// The reply (or failure) was delivered to the caller.
    fn on_received(&self) {}
}

/// Connection configuration. Every field defaults to absent.
#[derive(Default, Clone)]
pub struct ConnectOptions {
    /// Top-level keys identifying server-initiated messages, for
    /// example `"subscription"` and `"log"`.
    pub unilateral_labels: Vec<String>,
    /// Where unilateral messages are delivered. Receiving one with no
    /// callback registered is fatal to the connection.
    pub on_unilateral: Option<UnilateralCallback>,
    /// Test-synchronization hook.
    pub listener: Option<Arc<dyn CommandListener>>,
}

/// A submitted command's single-assignment result slot.
struct Pending {
    tx: oneshot::Sender<Result<Value>>,
}

struct Shared {
    /// One-way `active -> closed` flag. Checked by `submit` and set by
    /// the failure path before the queue is drained.
    closed: AtomicBool,
    /// Strict FIFO correlation queue of in-flight requests.
    pending: Mutex<VecDeque<Pending>>,
    unilateral_labels: Vec<String>,
    on_unilateral: Option<UnilateralCallback>,
    listener: Option<Arc<dyn CommandListener>>,
}

impl Shared {
    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<Pending>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The single failure-handling routine: flips the connection to
    /// closed and fulfills every pending request with a clone of the
    /// same error. First trigger wins; later calls find an empty
    /// queue and take no destructive action.
    fn fail_all(&self, error: Error) {
        let drained: Vec<Pending> = {
            let mut pending = self.lock_pending();
            self.closed.store(true, Ordering::SeqCst);
            pending.drain(..).collect()
        };
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), %error, "failing pending requests");
        }
        for slot in drained {
            let _ = slot.tx.send(Err(error.clone()));
        }
    }

    fn is_unilateral(&self, message: &Value) -> bool {
        self.unilateral_labels
            .iter()
            .any(|label| message.get(label).is_some())
    }

    /// Routes one decoded message. An error return is fatal to the
    /// connection.
    fn dispatch(&self, message: Value) -> Result<()> {
        if self.is_unilateral(&message) {
            match &self.on_unilateral {
                Some(callback) => {
                    callback(message);
                    return Ok(());
                }
                None => {
                    return Err(Error::Protocol(
                        "received unilateral message without any callback registered".into(),
                    ));
                }
            }
        }

        let slot = self.lock_pending().pop_front().ok_or_else(|| {
            Error::Protocol("reply arrived with no request pending".into())
        })?;

        let reason = message.get("error").map(|reason| match reason.as_str() {
            Some(s) => s.to_owned(),
            None => format!("{:?}", reason),
        });
        let result = match reason {
            Some(text) => Err(Error::Command {
                message: text,
                payload: message,
            }),
            None => Ok(message),
        };
        // The caller may have stopped waiting; that is not our problem.
        let _ = slot.tx.send(result);
        Ok(())
    }
}

/// A handle for one submitted command, resolved exactly once: with the
/// daemon's reply, with that command's own error, or with the
/// connection-wide failure.
pub struct ResponseHandle {
    rx: oneshot::Receiver<Result<Value>>,
    listener: Option<Arc<dyn CommandListener>>,
}

impl std::fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandle").finish_non_exhaustive()
    }
}

impl ResponseHandle {
    pub async fn wait(self) -> Result<Value> {
        // The sending side can only disappear if the whole connection
        // was torn down between fail_all draining and this await.
        let result = self.rx.await.unwrap_or(Err(Error::ClosingDown));
        if let Some(listener) = &self.listener {
            listener.on_received();
        }
        result
    }
}

/// One protocol connection to the daemon.
pub struct Connection {
    shared: Arc<Shared>,
    cmd_tx: mpsc::UnboundedSender<Vec<u8>>,
    /// Taken by `start`; present only before the receive loop exists.
    source: Mutex<Option<Box<dyn MessageSource>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Connection {
    /// Builds a connection from bare message source and sink seams.
    /// The sender task starts immediately; call [`start`] to begin
    /// the receive loop.
    ///
    /// [`start`]: Connection::start
    pub fn new(
        source: Box<dyn MessageSource>,
        mut sink: Box<dyn MessageSink>,
        options: ConnectOptions,
    ) -> Self {
        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
            unilateral_labels: options.unilateral_labels,
            on_unilateral: options.on_unilateral,
            listener: options.listener,
        });

        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        // Sender task: the single-writer discipline. Commands reach
        // the transport in submit order and writes never interleave.
        let sender_shared = shared.clone();
        tokio::spawn(async move {
            loop {
                let bytes = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    cmd = cmd_rx.recv() => match cmd {
                        Some(bytes) => bytes,
                        None => break,
                    },
                };
                if let Some(listener) = &sender_shared.listener {
                    listener.on_start();
                }
                // After a failure the queued command is skipped; its
                // pending slot has already been fulfilled with the
                // connection error.
                if !sender_shared.closed.load(Ordering::SeqCst) {
                    if let Err(e) = sink.write_message(&bytes).await {
                        tracing::warn!(%e, "write failed, tearing down connection");
                        sender_shared.fail_all(e);
                    }
                }
                if let Some(listener) = &sender_shared.listener {
                    listener.on_sent();
                }
            }
            let _ = sink.shutdown().await;
        });

        Self {
            shared,
            cmd_tx,
            source: Mutex::new(Some(source)),
            shutdown_tx,
        }
    }

    /// Builds a connection over a transport, layering the PDU codec
    /// over its split halves.
    pub fn from_transport(transport: Box<dyn Transport>, options: ConnectOptions) -> Self {
        let (reader, writer) = transport.split();
        Self::new(
            Box::new(PduSource::new(reader)),
            Box::new(PduSink::new(writer)),
            options,
        )
    }

    /// Whether the connection has been closed or has failed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Queues a command for transmission and registers its slot at
    /// the tail of the correlation queue. Returns the handle the
    /// caller waits on.
    ///
    /// Fails immediately, without touching the transport, once the
    /// connection is closed.
    pub fn submit(&self, command: &Value) -> Result<ResponseHandle> {
        if self.is_closed() {
            return Err(Error::ClosingDown);
        }
        let bytes = bser::encode_pdu(command);
        let (tx, rx) = oneshot::channel();

        // Slot registration and queueing happen under one lock so a
        // reply can never race ahead of its slot, and so submissions
        // hit the wire in the order their slots were appended.
        {
            let mut pending = self.shared.lock_pending();
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(Error::ClosingDown);
            }
            pending.push_back(Pending { tx });
            if self.cmd_tx.send(bytes).is_err() {
                pending.pop_back();
                return Err(Error::ClosingDown);
            }
        }

        Ok(ResponseHandle {
            rx,
            listener: self.shared.listener.clone(),
        })
    }

    /// Submits a command and waits for its reply.
    pub async fn run(&self, command: &Value) -> Result<Value> {
        self.submit(command)?.wait().await
    }

    /// Spawns the receive loop. Must be called before any reply can
    /// be delivered; calling it again is a no-op.
    pub fn start(&self) {
        let taken = {
            let mut source = self
                .source
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            source.take()
        };
        let Some(mut source) = taken else {
            return;
        };

        let shared = self.shared.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                // Covers a close() that landed before this task
                // subscribed to the shutdown channel.
                if *shutdown_rx.borrow() {
                    break;
                }
                let next = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    next = source.next_message() => next,
                };
                match next {
                    // Benign "no message": consume nothing.
                    Ok(None) => continue,
                    Ok(Some(message)) => {
                        if let Err(e) = shared.dispatch(message) {
                            tracing::warn!(%e, "fatal protocol error, tearing down connection");
                            shared.fail_all(e);
                            break;
                        }
                    }
                    Err(e) => {
                        shared.fail_all(e);
                        break;
                    }
                }
            }
        });
    }

    /// Closes the connection: fails every still-pending request with
    /// a "connection closing down" error, stops both tasks, and
    /// releases the transport. Idempotent, safe before [`start`], and
    /// safe concurrently with in-flight activity.
    ///
    /// [`start`]: Connection::start
    pub fn close(&self) {
        self.shared.fail_all(Error::ClosingDown);
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
