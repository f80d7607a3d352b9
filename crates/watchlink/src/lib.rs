//! # watchlink
//!
//! Client for a file-watching daemon's local control protocol:
//! BSER-encoded messages over a byte-stream transport, multiplexing
//! one connection into concurrent request/response exchanges plus
//! asynchronous "unilateral" push notifications.
//!
//! ## Layers
//!
//! - [`Connection`] — the protocol engine: single-writer send path,
//!   receive loop, strict FIFO request/reply correlation, unilateral
//!   demultiplexing, and whole-connection failure fan-out.
//! - [`Client`] — named operations (`watch`, `clock`, `subscribe`, …)
//!   assembled from [`bser::Value`]s and passed through the engine.
//! - [`Transport`] — the duplex byte pipe the engine runs over; a
//!   Unix socket implementation is provided, and anything that can
//!   split into tokio read/write halves will do.
//!
//! The engine performs no reconnection: a transport, decode, or
//! protocol error fails every pending request with the same cause and
//! kills the connection. Establishing a new one is the caller's job.

pub mod capabilities;
pub mod client;
pub mod connection;
pub mod error;
pub mod mock;
pub mod transport;

mod pdu;

pub use capabilities::check_capability;
pub use client::Client;
pub use client::SubscriptionCallback;
pub use client::SubscriptionDescriptor;
pub use connection::CommandListener;
pub use connection::ConnectOptions;
pub use connection::Connection;
pub use connection::ResponseHandle;
pub use connection::UnilateralCallback;
pub use error::Error;
pub use error::Result;
pub use transport::MessageSink;
pub use transport::MessageSource;
pub use transport::Transport;
#[cfg(unix)]
pub use transport::UnixTransport;
