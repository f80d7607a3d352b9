//! Errors surfaced by the connection engine and client.
//!
//! The engine fails every pending request with a clone of the same
//! error when the connection dies, so the type is `Clone`.

use bser::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Read or write failure on the underlying stream. Fatal to the
    /// connection.
    Transport(String),
    /// The peer closed the stream. Fatal to the connection.
    Eof,
    /// Malformed or truncated wire data. Fatal to the connection.
    Decode(bser::Error),
    /// The peer violated the protocol, for example a unilateral
    /// message with no listener registered. Fatal to the connection.
    Protocol(String),
    /// The daemon rejected one specific command. Carries the whole
    /// decoded reply so callers can inspect structured detail. Local
    /// to that command; the connection stays usable.
    Command { message: String, payload: Value },
    /// The connection was closed or has already failed; the command
    /// never touched the transport.
    ClosingDown,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Eof => write!(f, "connection closed by peer"),
            Self::Decode(e) => write!(f, "decode error: {}", e),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Command { message, .. } => write!(f, "command failed: {}", message),
            Self::ClosingDown => write!(f, "connection closing down"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::Eof,
            _ => Self::Transport(e.to_string()),
        }
    }
}

impl From<bser::Error> for Error {
    fn from(e: bser::Error) -> Self {
        Self::Decode(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
