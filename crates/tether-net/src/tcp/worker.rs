//! The background thread that owns a live connection.
//!
//! Each successful [`connect`](super::SocketHandle::connect) spawns one
//! [`IoWorker`] on its own thread. The worker performs the handshake, emits
//! `Connected` or `ConnectionFailed`, then runs a blocking receive loop until
//! the peer closes, a read fails or the socket is closed locally. On the way
//! out it releases the connection once and emits a single `Interruption`.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tether_core::logging::targets;

use super::config::SocketConfig;
use super::dispatch::Dispatcher;
use super::event::{DisconnectReason, SocketEvent};
use super::socket::SocketHandle;
use crate::Result;
use crate::error::NetworkError;

/// The part of a worker's connection shared with the owning socket.
///
/// The socket uses it to write from the caller's thread and to interrupt the
/// blocking read. The worker keeps exclusive ownership of the read half.
pub(crate) struct Link {
    stream: OnceLock<TcpStream>,
    interrupted: AtomicBool,
    write_guard: Mutex<()>,
}

impl Link {
    pub(crate) fn new() -> Self {
        Self {
            stream: OnceLock::new(),
            interrupted: AtomicBool::new(false),
            write_guard: Mutex::new(()),
        }
    }

    /// Install the write half once the handshake has completed.
    pub(super) fn attach(&self, writer: TcpStream) {
        if self.stream.set(writer).is_err() {
            tracing::warn!(target: targets::WORKER, "link already attached");
        }
    }

    /// Request the worker to stop and unblock its read.
    ///
    /// Before the handshake completes this only sets the flag; the worker
    /// polls it while waiting for the handshake and abandons the attempt.
    pub(crate) fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
        if let Some(stream) = self.stream.get() {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                tracing::trace!(target: targets::WORKER, error = %err, "interrupt shutdown failed");
            }
        }
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Write the whole payload. Concurrent writers are serialized so their
    /// payloads never interleave.
    pub(crate) fn write(&self, data: &[u8]) -> io::Result<()> {
        let Some(mut stream) = self.stream.get() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        let _guard = self.write_guard.lock();
        stream.write_all(data)?;
        stream.flush()
    }
}

/// The worker's read half. Released exactly once.
struct Session {
    stream: Option<TcpStream>,
}

impl Session {
    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                // Already shut down by an interrupt or by the peer.
                tracing::trace!(target: targets::WORKER, error = %err, "ignoring shutdown error");
            }
            tracing::trace!(target: targets::WORKER, "session released");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

/// Notifies the socket when the worker thread is done, even if it unwinds.
struct ExitGuard<'a>(&'a SocketHandle);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}

/// Everything one connection attempt needs, moved onto the worker thread.
pub(crate) struct IoWorker {
    config: SocketConfig,
    generation: u64,
    link: Arc<Link>,
    socket: SocketHandle,
    dispatcher: Dispatcher,
}

impl IoWorker {
    pub(crate) fn new(
        config: SocketConfig,
        generation: u64,
        link: Arc<Link>,
        socket: SocketHandle,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            generation,
            link,
            socket,
            dispatcher,
        }
    }

    /// Start the worker on a new named thread.
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("tether-socket-{}", self.config.id))
            .spawn(move || self.run())
    }

    fn run(self) {
        let _exit = ExitGuard(&self.socket);
        let span = tracing::debug_span!(
            target: targets::WORKER,
            "socket_worker",
            id = self.config.id,
            generation = self.generation
        );
        let _entered = span.enter();

        tracing::debug!(target: targets::WORKER, address = %self.config.address(), "connecting");
        let (reader, writer) = match self.establish() {
            Ok(streams) => streams,
            Err(_) if self.link.is_interrupted() => {
                tracing::debug!(target: targets::WORKER, "handshake abandoned");
                self.socket.connect_failed(self.generation);
                self.dispatcher
                    .dispatch(SocketEvent::Interruption(DisconnectReason::Closed));
                return;
            }
            Err(err) => {
                tracing::warn!(target: targets::WORKER, error = %err, "connection failed");
                self.socket.connect_failed(self.generation);
                self.dispatcher.dispatch(SocketEvent::ConnectionFailed);
                return;
            }
        };

        let mut session = Session {
            stream: Some(reader),
        };
        if !self.socket.connect_succeeded(self.generation, &self.link, writer) {
            tracing::debug!(target: targets::WORKER, "closed during handshake");
            session.release();
            self.dispatcher
                .dispatch(SocketEvent::Interruption(DisconnectReason::Closed));
            return;
        }

        tracing::info!(target: targets::WORKER, address = %self.config.address(), "connected");
        self.dispatcher.dispatch(SocketEvent::Connected);

        let reason = match &session.stream {
            Some(stream) => self.receive_loop(stream),
            None => DisconnectReason::Closed,
        };

        session.release();
        self.socket.session_ended(self.generation);
        tracing::info!(target: targets::WORKER, %reason, "connection ended");
        self.dispatcher.dispatch(SocketEvent::Interruption(reason));
    }

    /// Resolve the endpoint and connect, trying each address until one
    /// succeeds or the timeout runs out.
    fn establish(&self) -> Result<(TcpStream, TcpStream)> {
        let addrs: Vec<SocketAddr> = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(NetworkError::connect)?
            .collect();
        if addrs.is_empty() {
            return Err(NetworkError::Connection(format!(
                "no addresses found for {}",
                self.config.address()
            )));
        }

        let deadline = self.config.connect_timeout.map(|timeout| Instant::now() + timeout);
        let mut last_error = None;
        for addr in addrs {
            if self.link.is_interrupted() {
                return Err(closed_while_connecting());
            }
            match self.connect_addr(addr, deadline) {
                Ok(stream) => return self.prepare(stream),
                Err(_) if self.link.is_interrupted() => return Err(closed_while_connecting()),
                Err(err) => {
                    tracing::debug!(target: targets::WORKER, %addr, error = %err, "address failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(NetworkError::Timeout))
    }

    /// Connect to one address. The socket is created up front so the
    /// handshake can be abandoned when the link is interrupted.
    fn connect_addr(&self, addr: SocketAddr, deadline: Option<Instant>) -> Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(NetworkError::connect)?;
        self.handshake(&socket, &addr.into(), deadline)?;
        Ok(TcpStream::from(socket))
    }

    #[cfg(unix)]
    fn handshake(&self, socket: &Socket, addr: &SockAddr, deadline: Option<Instant>) -> Result<()> {
        socket.set_nonblocking(true).map_err(NetworkError::connect)?;
        match socket.connect(addr) {
            Ok(()) => {}
            Err(err) if handshake_pending(&err) => self.await_handshake(socket, deadline)?,
            Err(err) => return Err(NetworkError::connect(err)),
        }
        socket.set_nonblocking(false).map_err(NetworkError::connect)
    }

    // Without poll(2) the handshake blocks until it settles or times out;
    // an interrupt is only observed once it returns.
    #[cfg(not(unix))]
    fn handshake(&self, socket: &Socket, addr: &SockAddr, deadline: Option<Instant>) -> Result<()> {
        let attempt = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(NetworkError::Timeout);
                }
                socket.connect_timeout(addr, remaining)
            }
            None => socket.connect(addr),
        };
        attempt.map_err(NetworkError::connect)
    }

    /// Wait for a pending handshake in short slices, giving up as soon as
    /// the link is interrupted or the deadline passes.
    #[cfg(unix)]
    fn await_handshake(&self, socket: &Socket, deadline: Option<Instant>) -> Result<()> {
        loop {
            if self.link.is_interrupted() {
                return Err(closed_while_connecting());
            }
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(NetworkError::Timeout);
                    }
                    remaining.min(HANDSHAKE_SLICE)
                }
                None => HANDSHAKE_SLICE,
            };
            if !poll_writable(socket, slice).map_err(NetworkError::connect)? {
                continue;
            }
            if let Some(err) = socket.take_error().map_err(NetworkError::connect)? {
                return Err(NetworkError::connect(err));
            }
            // Hang-ups also wake poll, so confirm there is a peer.
            return socket.peer_addr().map(drop).map_err(NetworkError::connect);
        }
    }

    /// Apply socket options and split off the write half.
    fn prepare(&self, stream: TcpStream) -> Result<(TcpStream, TcpStream)> {
        if self.config.no_delay {
            if let Err(err) = stream.set_nodelay(true) {
                tracing::warn!(target: targets::WORKER, error = %err, "failed to set TCP_NODELAY");
            }
        }
        let write_timeout = self.config.write_timeout.filter(|timeout| !timeout.is_zero());
        if let Err(err) = stream.set_write_timeout(write_timeout) {
            tracing::warn!(target: targets::WORKER, error = %err, "failed to set write timeout");
        }
        let writer = stream.try_clone().map_err(NetworkError::connect)?;
        Ok((stream, writer))
    }

    /// Read until the connection ends, emitting one event per successful read.
    fn receive_loop(&self, mut stream: &TcpStream) -> DisconnectReason {
        let mut scratch = vec![0u8; self.config.read_buffer_size.max(1)];
        loop {
            if self.link.is_interrupted() {
                return DisconnectReason::Closed;
            }
            match stream.read(&mut scratch) {
                Ok(0) => {
                    return if self.link.is_interrupted() {
                        DisconnectReason::Closed
                    } else {
                        DisconnectReason::PeerClosed
                    };
                }
                Ok(count) => {
                    tracing::trace!(target: targets::WORKER, count, "received");
                    self.dispatcher.dispatch(SocketEvent::Received {
                        bytes: Bytes::copy_from_slice(&scratch[..count]),
                        count,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return if self.link.is_interrupted() {
                        DisconnectReason::Closed
                    } else {
                        DisconnectReason::Error(err.to_string())
                    };
                }
            }
        }
    }
}

/// Upper bound on how long an interrupt can go unnoticed during a handshake.
#[cfg(unix)]
const HANDSHAKE_SLICE: Duration = Duration::from_millis(25);

fn closed_while_connecting() -> NetworkError {
    NetworkError::Connection("closed while connecting".into())
}

#[cfg(unix)]
fn handshake_pending(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.kind() == io::ErrorKind::Interrupted
        || err.raw_os_error() == Some(libc::EINPROGRESS)
}

/// Wait up to `timeout` for the socket to become writable.
#[cfg(unix)]
fn poll_writable(socket: &Socket, timeout: Duration) -> io::Result<bool> {
    use std::os::fd::AsRawFd;

    let mut pollfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };
    let millis = timeout.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int;
    // SAFETY: `pollfd` is a single valid entry that outlives the call.
    match unsafe { libc::poll(&mut pollfd, 1, millis) } {
        -1 => {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                Ok(false)
            } else {
                Err(err)
            }
        }
        0 => Ok(false),
        _ => Ok(true),
    }
}
