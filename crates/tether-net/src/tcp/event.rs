//! Lifecycle events and the listener contract.

use bytes::Bytes;

use super::socket::SocketHandle;

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// [`close`](SocketHandle::close) was called.
    Closed,
    /// The peer closed the connection.
    PeerClosed,
    /// A read failed.
    Error(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed locally"),
            Self::PeerClosed => write!(f, "closed by peer"),
            Self::Error(msg) => write!(f, "read error: {msg}"),
        }
    }
}

/// An event emitted by a socket's worker.
///
/// For one connection attempt the worker emits either a single
/// [`ConnectionFailed`](Self::ConnectionFailed), or [`Connected`](Self::Connected)
/// followed by any number of [`Received`](Self::Received) and exactly one
/// terminal [`Interruption`](Self::Interruption). An attempt closed while the
/// handshake was still in flight ends with a lone `Interruption` (or
/// `ConnectionFailed` if the handshake failed anyway).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    /// The handshake succeeded.
    Connected,
    /// The handshake failed or timed out.
    ConnectionFailed,
    /// The session ended.
    Interruption(DisconnectReason),
    /// Bytes arrived from the peer.
    Received {
        /// Exactly the bytes produced by one read.
        bytes: Bytes,
        /// Number of bytes, always `bytes.len()`.
        count: usize,
    },
}

impl SocketEvent {
    /// Short name used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::ConnectionFailed => "connection_failed",
            Self::Interruption(_) => "interruption",
            Self::Received { .. } => "received",
        }
    }
}

/// Receives socket events.
///
/// Implement the individual callbacks you care about; the rest default to
/// doing nothing. Any `Fn(&SocketHandle, &SocketEvent)` closure is also a
/// listener.
///
/// Every callback receives a handle to the socket that produced the event, so
/// one listener can serve several sockets and may call
/// [`send`](SocketHandle::send), [`close`](SocketHandle::close) or
/// [`connect`](SocketHandle::connect) from inside a callback.
pub trait SocketListener: Send + Sync + 'static {
    /// The handshake succeeded.
    fn on_connected(&self, _socket: &SocketHandle) {}

    /// The handshake failed.
    fn on_connection_failed(&self, _socket: &SocketHandle) {}

    /// The session ended.
    fn on_interruption(&self, _socket: &SocketHandle, _reason: &DisconnectReason) {}

    /// Bytes arrived.
    fn on_receive(&self, _socket: &SocketHandle, _bytes: &Bytes, _count: usize) {}

    /// Route an event to the matching callback.
    fn on_event(&self, socket: &SocketHandle, event: &SocketEvent) {
        match event {
            SocketEvent::Connected => self.on_connected(socket),
            SocketEvent::ConnectionFailed => self.on_connection_failed(socket),
            SocketEvent::Interruption(reason) => self.on_interruption(socket, reason),
            SocketEvent::Received { bytes, count } => self.on_receive(socket, bytes, *count),
        }
    }
}

impl<F> SocketListener for F
where
    F: Fn(&SocketHandle, &SocketEvent) + Send + Sync + 'static,
{
    fn on_event(&self, socket: &SocketHandle, event: &SocketEvent) {
        self(socket, event)
    }
}
