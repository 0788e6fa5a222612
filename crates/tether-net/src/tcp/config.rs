//! Configuration types for sockets.

use std::time::Duration;

use tether_core::ContextHandle;

use crate::Result;
use crate::error::NetworkError;

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default size of the receive scratch buffer. Larger payloads arrive as
/// several successive receive events.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Where listener callbacks run.
#[derive(Clone, Debug, Default)]
pub enum CallbackMode {
    /// Invoke the listener directly on the socket's worker thread.
    ///
    /// The listener runs concurrently with the caller and blocks the receive
    /// loop while it executes.
    #[default]
    Inline,
    /// Post every event to a [`MainContext`](tether_core::MainContext) and
    /// invoke the listener on that context's thread.
    Marshalled(ContextHandle),
}

impl CallbackMode {
    /// Check whether events are marshalled to another context.
    pub fn is_marshalled(&self) -> bool {
        matches!(self, Self::Marshalled(_))
    }
}

/// Configuration for an [`AsyncSocket`](super::AsyncSocket).
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// Opaque identifier chosen by the caller. Only used for logging and for
    /// telling sockets apart in a shared listener.
    pub id: u32,
    /// The host to connect to.
    pub host: String,
    /// The port to connect to.
    pub port: u16,
    /// Connection timeout. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Where listener callbacks run.
    pub callback: CallbackMode,
    /// Size of the receive scratch buffer in bytes.
    pub read_buffer_size: usize,
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Write timeout for [`send`](super::SocketHandle::send). `None` means no timeout.
    pub write_timeout: Option<Duration>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            id: 0,
            host: String::new(),
            port: 0,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            callback: CallbackMode::Inline,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            no_delay: false,
            write_timeout: None,
        }
    }
}

impl SocketConfig {
    /// Create a new configuration for the given endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the opaque identifier.
    pub fn id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    /// Set the connection timeout. A zero duration waits indefinitely.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = normalize_timeout(timeout);
        self
    }

    /// Disable the connection timeout.
    pub fn no_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Choose where listener callbacks run.
    pub fn callback_mode(mut self, mode: CallbackMode) -> Self {
        self.callback = mode;
        self
    }

    /// Deliver events on the context behind `handle`.
    pub fn marshalled(mut self, handle: ContextHandle) -> Self {
        self.callback = CallbackMode::Marshalled(handle);
        self
    }

    /// Set the receive scratch buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Get the `host:port` address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that the endpoint can be connected to.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(NetworkError::InvalidHost);
        }
        Ok(())
    }
}

/// Map a zero timeout to "wait indefinitely".
pub(crate) fn normalize_timeout(timeout: Duration) -> Option<Duration> {
    if timeout.is_zero() { None } else { Some(timeout) }
}

/// Validate a port number supplied as a wider integer.
pub(crate) fn validate_port(port: i32) -> Result<u16> {
    u16::try_from(port).map_err(|_| NetworkError::InvalidPort(port))
}
