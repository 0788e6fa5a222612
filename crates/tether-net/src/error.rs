//! Error types for the networking module.

use crate::tcp::SocketState;

/// Network-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The configured host is empty.
    #[error("Invalid host: host must not be empty")]
    InvalidHost,
    /// The port is outside `0..=65535`.
    #[error("Invalid port {0}: expected a value in 0..=65535")]
    InvalidPort(i32),
    /// The operation is only allowed while not connected.
    #[error("Operation not allowed while {0}")]
    InvalidState(SocketState),
    /// The socket is not connected.
    #[error("Not connected")]
    NotConnected,
    /// Sending an empty payload was requested.
    #[error("Refusing to send an empty payload")]
    EmptyPayload,
    /// The connection attempt timed out.
    #[error("Connection timed out")]
    Timeout,
    /// The connection attempt failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A read or write on an established connection failed.
    #[error("TCP socket error: {0}")]
    TcpSocket(String),
    /// The background worker thread could not be started.
    #[error("Failed to start socket worker: {0}")]
    Spawn(String),
}

impl NetworkError {
    /// Classify an I/O error raised while establishing a connection.
    pub(crate) fn connect(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            _ => Self::Connection(err.to_string()),
        }
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors raised while decoding from or patching a [`ByteStream`](crate::stream::ByteStream).
///
/// None of these are fatal: a failed read leaves the read cursor where it was,
/// so the caller can wait for more bytes and try again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Fewer bytes are available than the read requires.
    #[error("Buffer underrun: needed {needed} bytes, {available} available")]
    Underrun {
        /// Bytes the read needed.
        needed: usize,
        /// Bytes that were available.
        available: usize,
    },
    /// A length prefix was negative (other than the absent-string sentinel).
    #[error("Negative length prefix {0}")]
    NegativeLength(i32),
    /// String payload could not be decoded with the stream's charset.
    #[error("Invalid string data: {0}")]
    InvalidString(String),
    /// A UTF-16 code unit did not form a valid character.
    #[error("Invalid UTF-16 code unit {0:#06x}")]
    InvalidChar(u16),
    /// A patch range lies outside the written data.
    #[error("Range of {len} bytes at offset {offset} is outside a stream of {size} bytes")]
    OutOfBounds {
        /// Start of the range.
        offset: usize,
        /// Length of the range.
        len: usize,
        /// Current stream length.
        size: usize,
    },
    /// A payload is too large for a 32-bit length prefix.
    #[error("Payload of {0} bytes does not fit a 32-bit length prefix")]
    TooLong(usize),
}
