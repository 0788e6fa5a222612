//! The connection manager: configuration, state machine and public contract.

use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tether_core::logging::targets;

use super::config::{CallbackMode, SocketConfig, normalize_timeout, validate_port};
use super::dispatch::Dispatcher;
use super::event::SocketListener;
use super::state::SocketState;
use super::worker::{IoWorker, Link};
use crate::Result;
use crate::error::NetworkError;

/// Mutable state, always accessed under one lock so that caller operations
/// and worker transitions never interleave.
struct Inner {
    config: SocketConfig,
    state: SocketState,
    /// Incremented per connect; worker transitions carrying an older value are
    /// ignored.
    generation: u64,
    /// Present while a worker owns a connection attempt or session.
    link: Option<Arc<Link>>,
    live_workers: usize,
    worker_thread: Option<ThreadId>,
}

struct Shared {
    inner: Mutex<Inner>,
    worker_exited: Condvar,
    listener: Option<Arc<dyn SocketListener>>,
}

/// A cloneable handle to a socket.
///
/// Listener callbacks receive one, and it can be cloned freely to operate the
/// socket from other threads. All operations are safe to call from any thread,
/// including from inside a listener callback.
#[derive(Clone)]
pub struct SocketHandle {
    shared: Arc<Shared>,
}

impl SocketHandle {
    fn new(config: SocketConfig, listener: Option<Arc<dyn SocketListener>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    config,
                    state: SocketState::NotConnected,
                    generation: 0,
                    link: None,
                    live_workers: 0,
                    worker_thread: None,
                }),
                worker_exited: Condvar::new(),
                listener,
            }),
        }
    }

    /// Get the opaque identifier.
    pub fn id(&self) -> u32 {
        self.shared.inner.lock().config.id
    }

    /// Get the configured host.
    pub fn host(&self) -> String {
        self.shared.inner.lock().config.host.clone()
    }

    /// Get the configured port.
    pub fn port(&self) -> u16 {
        self.shared.inner.lock().config.port
    }

    /// Get the `host:port` address string.
    pub fn address(&self) -> String {
        self.shared.inner.lock().config.address()
    }

    /// Get the connection timeout. `None` waits indefinitely.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.shared.inner.lock().config.connect_timeout
    }

    /// Get a copy of the current configuration.
    pub fn config(&self) -> SocketConfig {
        self.shared.inner.lock().config.clone()
    }

    /// Get the current state.
    pub fn state(&self) -> SocketState {
        self.shared.inner.lock().state
    }

    /// Check whether the socket is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == SocketState::Connected
    }

    /// Check whether a listener is registered.
    pub fn has_listener(&self) -> bool {
        self.shared.listener.is_some()
    }

    /// Check whether two handles refer to the same socket.
    pub fn ptr_eq(&self, other: &SocketHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Change the host. Only allowed while not connected.
    pub fn set_host(&self, host: impl Into<String>) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != SocketState::NotConnected {
            return Err(NetworkError::InvalidState(inner.state));
        }
        inner.config.host = host.into();
        tracing::debug!(
            target: targets::SOCKET,
            id = inner.config.id,
            host = %inner.config.host,
            "host changed"
        );
        Ok(())
    }

    /// Change the port. Only allowed while not connected.
    ///
    /// Returns [`NetworkError::InvalidPort`] for values outside `0..=65535`.
    pub fn set_port(&self, port: i32) -> Result<()> {
        let port = validate_port(port)?;
        let mut inner = self.shared.inner.lock();
        if inner.state != SocketState::NotConnected {
            return Err(NetworkError::InvalidState(inner.state));
        }
        inner.config.port = port;
        tracing::debug!(target: targets::SOCKET, id = inner.config.id, port, "port changed");
        Ok(())
    }

    /// Change the opaque identifier.
    pub fn set_id(&self, id: u32) {
        self.shared.inner.lock().config.id = id;
    }

    /// Change the connection timeout used by the next connect. A zero
    /// duration waits indefinitely.
    pub fn set_connect_timeout(&self, timeout: Duration) {
        let mut inner = self.shared.inner.lock();
        inner.config.connect_timeout = normalize_timeout(timeout);
        tracing::debug!(
            target: targets::SOCKET,
            id = inner.config.id,
            timeout = ?inner.config.connect_timeout,
            "connect timeout changed"
        );
    }

    /// Change where listener callbacks of the next connection run.
    pub fn set_callback_mode(&self, mode: CallbackMode) {
        let mut inner = self.shared.inner.lock();
        tracing::debug!(
            target: targets::SOCKET,
            id = inner.config.id,
            marshalled = mode.is_marshalled(),
            "callback mode changed"
        );
        inner.config.callback = mode;
    }

    /// Start connecting in the background.
    ///
    /// Does nothing unless the socket is [`NotConnected`](SocketState::NotConnected).
    /// Otherwise validates the configuration, moves to
    /// [`Connecting`](SocketState::Connecting) and starts a worker that reports
    /// the outcome through the listener.
    ///
    /// If the worker of a previous connection is still shutting down, this
    /// waits for it to exit first, so at most one worker runs per socket. The
    /// wait is skipped when called from that worker's own callback.
    pub fn connect(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != SocketState::NotConnected {
            tracing::debug!(
                target: targets::SOCKET,
                id = inner.config.id,
                state = %inner.state,
                "connect ignored"
            );
            return Ok(());
        }
        inner.config.validate()?;

        let current = thread::current().id();
        while inner.live_workers > 0 && inner.worker_thread != Some(current) {
            tracing::debug!(
                target: targets::SOCKET,
                id = inner.config.id,
                "waiting for previous worker to exit"
            );
            self.shared.worker_exited.wait(&mut inner);
            if inner.state != SocketState::NotConnected {
                return Ok(());
            }
        }

        inner.generation += 1;
        let generation = inner.generation;
        let link = Arc::new(Link::new());
        let dispatcher = Dispatcher::new(
            self.clone(),
            self.shared.listener.clone(),
            inner.config.callback.clone(),
        );
        let worker = IoWorker::new(
            inner.config.clone(),
            generation,
            link.clone(),
            self.clone(),
            dispatcher,
        );

        // The worker blocks on this lock before its first transition, so the
        // state below is in place before it can change it.
        let handle = worker
            .spawn()
            .map_err(|err| NetworkError::Spawn(err.to_string()))?;
        inner.state = SocketState::Connecting;
        inner.link = Some(link);
        inner.live_workers += 1;
        inner.worker_thread = Some(handle.thread().id());

        tracing::debug!(
            target: targets::SOCKET,
            id = inner.config.id,
            generation,
            address = %inner.config.address(),
            "connect started"
        );
        Ok(())
    }

    /// Close the connection.
    ///
    /// Does nothing when already [`NotConnected`](SocketState::NotConnected).
    /// Otherwise the state is `NotConnected` as soon as this returns, and the
    /// worker is asked to stop. It releases the connection and emits a single
    /// `Interruption` event once its blocking call returns.
    pub fn close(&self) {
        let link = {
            let mut inner = self.shared.inner.lock();
            if inner.state == SocketState::NotConnected {
                return;
            }
            tracing::debug!(
                target: targets::SOCKET,
                id = inner.config.id,
                state = %inner.state,
                "closing"
            );
            inner.state = SocketState::NotConnected;
            inner.link.take()
        };
        if let Some(link) = link {
            link.interrupt();
        }
    }

    /// Write `data` to the peer, blocking until it has been written.
    ///
    /// Fails without writing anything unless the socket is connected and
    /// `data` is non-empty. Returns the number of bytes written.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Err(NetworkError::EmptyPayload);
        }
        let (link, id) = {
            let inner = self.shared.inner.lock();
            if inner.state != SocketState::Connected {
                return Err(NetworkError::NotConnected);
            }
            (inner.link.clone(), inner.config.id)
        };
        let link = link.ok_or(NetworkError::NotConnected)?;

        link.write(data).map_err(|err| {
            tracing::warn!(target: targets::SOCKET, id, error = %err, "send failed");
            NetworkError::TcpSocket(err.to_string())
        })?;
        tracing::trace!(target: targets::SOCKET, id, len = data.len(), "sent");
        Ok(data.len())
    }

    // =========================================================================
    // Worker Transitions
    // =========================================================================

    /// `Connecting -> NotConnected` after a failed handshake.
    pub(crate) fn connect_failed(&self, generation: u64) {
        let mut inner = self.shared.inner.lock();
        if inner.generation == generation && inner.state == SocketState::Connecting {
            inner.state = SocketState::NotConnected;
            inner.link = None;
        }
    }

    /// `Connecting -> Connected` after a successful handshake.
    ///
    /// Returns `false` if the attempt was closed or superseded meanwhile, in
    /// which case the caller must drop the connection.
    pub(crate) fn connect_succeeded(
        &self,
        generation: u64,
        link: &Link,
        writer: TcpStream,
    ) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.generation != generation || inner.state != SocketState::Connecting {
            return false;
        }
        link.attach(writer);
        inner.state = SocketState::Connected;
        true
    }

    /// `Connected -> NotConnected` when the receive loop ends.
    pub(crate) fn session_ended(&self, generation: u64) {
        let mut inner = self.shared.inner.lock();
        if inner.generation == generation && inner.state.is_active() {
            inner.state = SocketState::NotConnected;
            inner.link = None;
        }
    }

    /// Called last on every worker thread.
    pub(crate) fn worker_exited(&self) {
        let mut inner = self.shared.inner.lock();
        inner.live_workers = inner.live_workers.saturating_sub(1);
        if inner.worker_thread == Some(thread::current().id()) {
            inner.worker_thread = None;
        }
        self.shared.worker_exited.notify_all();
    }
}

impl std::fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("SocketHandle")
            .field("id", &inner.config.id)
            .field("address", &inner.config.address())
            .field("state", &inner.state)
            .finish()
    }
}

/// An asynchronous TCP client connection.
///
/// `AsyncSocket` manages one logical connection at a time. [`connect`] returns
/// immediately; a background worker performs the handshake and then reads
/// from the peer, reporting every lifecycle change and every received chunk to
/// the [`SocketListener`]. [`send`] writes synchronously on the caller's
/// thread and may run concurrently with the worker's reads.
///
/// The socket can be reused: after [`close`] (or after the connection ends)
/// it is back in [`SocketState::NotConnected`] and may connect again.
/// Dropping the `AsyncSocket` closes it.
///
/// All operations are available through [`Deref`](std::ops::Deref) to
/// [`SocketHandle`].
///
/// # Example
///
/// ```no_run
/// use tether_net::{AsyncSocket, SocketConfig, SocketEvent, SocketHandle};
///
/// let config = SocketConfig::new("127.0.0.1", 7000).id(1);
/// let socket = AsyncSocket::with_listener(config, |socket: &SocketHandle, event: &SocketEvent| {
///     if let SocketEvent::Received { bytes, .. } = event {
///         println!("socket {} received {:?}", socket.id(), bytes);
///     }
/// });
///
/// socket.connect().unwrap();
/// ```
///
/// [`connect`]: SocketHandle::connect
/// [`send`]: SocketHandle::send
/// [`close`]: SocketHandle::close
pub struct AsyncSocket {
    handle: SocketHandle,
}

impl AsyncSocket {
    /// Create a socket without a listener. Events are discarded.
    pub fn new(config: SocketConfig) -> Self {
        Self {
            handle: SocketHandle::new(config, None),
        }
    }

    /// Create a socket that reports events to `listener`.
    pub fn with_listener(config: SocketConfig, listener: impl SocketListener) -> Self {
        Self::with_shared_listener(config, Arc::new(listener))
    }

    /// Create a socket that reports events to a listener shared with other
    /// sockets.
    pub fn with_shared_listener(config: SocketConfig, listener: Arc<dyn SocketListener>) -> Self {
        Self {
            handle: SocketHandle::new(config, Some(listener)),
        }
    }

    /// Get a cloneable handle to this socket.
    pub fn handle(&self) -> SocketHandle {
        self.handle.clone()
    }
}

impl std::ops::Deref for AsyncSocket {
    type Target = SocketHandle;

    fn deref(&self) -> &SocketHandle {
        &self.handle
    }
}

impl Drop for AsyncSocket {
    fn drop(&mut self) {
        self.handle.close();
    }
}

impl std::fmt::Debug for AsyncSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.handle.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let socket = AsyncSocket::new(SocketConfig::new("localhost", 8080).id(3));
        assert_eq!(socket.state(), SocketState::NotConnected);
        assert!(!socket.is_connected());
        assert!(!socket.has_listener());
        assert_eq!(socket.id(), 3);
        assert_eq!(socket.host(), "localhost");
        assert_eq!(socket.port(), 8080);
        assert_eq!(socket.address(), "localhost:8080");
    }

    #[test]
    fn test_send_requires_connection() {
        let socket = AsyncSocket::new(SocketConfig::new("localhost", 8080));
        assert!(matches!(socket.send(b"data"), Err(NetworkError::NotConnected)));
        assert!(matches!(socket.send(b""), Err(NetworkError::EmptyPayload)));
    }

    #[test]
    fn test_close_when_not_connected_is_noop() {
        let socket = AsyncSocket::new(SocketConfig::new("localhost", 8080));
        socket.close();
        assert_eq!(socket.state(), SocketState::NotConnected);
    }

    #[test]
    fn test_connect_rejects_empty_host() {
        let socket = AsyncSocket::new(SocketConfig::new("", 8080));
        assert!(matches!(socket.connect(), Err(NetworkError::InvalidHost)));
        assert_eq!(socket.state(), SocketState::NotConnected);
    }

    #[test]
    fn test_setters() {
        let socket = AsyncSocket::new(SocketConfig::new("localhost", 8080));

        socket.set_host("example.com").unwrap();
        socket.set_port(443).unwrap();
        socket.set_id(9);
        socket.set_connect_timeout(Duration::from_millis(500));
        assert_eq!(socket.address(), "example.com:443");
        assert_eq!(socket.id(), 9);
        assert_eq!(socket.connect_timeout(), Some(Duration::from_millis(500)));

        socket.set_connect_timeout(Duration::ZERO);
        assert_eq!(socket.connect_timeout(), None);

        assert!(matches!(socket.set_port(-1), Err(NetworkError::InvalidPort(-1))));
        assert!(matches!(
            socket.set_port(70000),
            Err(NetworkError::InvalidPort(70000))
        ));
        assert_eq!(socket.port(), 443);
    }

    #[test]
    fn test_handles_share_state() {
        let socket = AsyncSocket::new(SocketConfig::new("localhost", 8080));
        let handle = socket.handle();
        assert!(handle.ptr_eq(&socket));

        handle.set_id(42);
        assert_eq!(socket.id(), 42);

        let other = AsyncSocket::new(SocketConfig::new("localhost", 8080));
        assert!(!handle.ptr_eq(&other));
    }
}
