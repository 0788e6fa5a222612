//! Lifecycle state of a socket.

/// Current state of an [`AsyncSocket`](super::AsyncSocket).
///
/// Legal transitions:
///
/// - `NotConnected -> Connecting` on [`connect`](super::SocketHandle::connect)
/// - `Connecting -> Connected` when the handshake succeeds
/// - `Connecting -> NotConnected` when the handshake fails or on close
/// - `Connected -> NotConnected` on close, peer close or a read failure
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SocketState {
    /// No connection and no worker. The initial state.
    #[default]
    NotConnected,
    /// A worker is attempting the handshake.
    Connecting,
    /// Connected and ready to send/receive data.
    Connected,
}

impl SocketState {
    /// Check whether a connection attempt or session is in progress.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::NotConnected)
    }
}

impl std::fmt::Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "NotConnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}
