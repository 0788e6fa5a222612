//! Asynchronous TCP client connection.
//!
//! - **AsyncSocket**: owns the configuration and state machine, and exposes
//!   `connect`/`send`/`close`
//! - **IoWorker**: one background thread per connection attempt that performs
//!   the handshake and runs the blocking receive loop
//! - **Dispatcher**: delivers each [`SocketEvent`] to the [`SocketListener`]
//!   inline on the worker thread or marshalled to a
//!   [`MainContext`](tether_core::MainContext)
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use tether_core::MainContext;
//! use tether_net::tcp::{
//!     AsyncSocket, DisconnectReason, SocketConfig, SocketHandle, SocketListener,
//! };
//!
//! struct Printer;
//!
//! impl SocketListener for Printer {
//!     fn on_connected(&self, socket: &SocketHandle) {
//!         socket.send(b"hello").ok();
//!     }
//!
//!     fn on_receive(&self, _socket: &SocketHandle, bytes: &Bytes, count: usize) {
//!         println!("{count} bytes: {bytes:?}");
//!     }
//!
//!     fn on_interruption(&self, _socket: &SocketHandle, reason: &DisconnectReason) {
//!         println!("connection ended: {reason}");
//!     }
//! }
//!
//! let context = MainContext::new();
//! let config = SocketConfig::new("127.0.0.1", 7000).marshalled(context.handle());
//! let socket = AsyncSocket::with_listener(config, Printer);
//! socket.connect().unwrap();
//!
//! // Listener callbacks run here, on the context's thread.
//! context.run_for(std::time::Duration::from_secs(5));
//! ```

mod config;
mod dispatch;
mod event;
mod socket;
mod state;
mod worker;

pub use config::{CallbackMode, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_BUFFER_SIZE, SocketConfig};
pub use event::{DisconnectReason, SocketEvent, SocketListener};
pub use socket::{AsyncSocket, SocketHandle};
pub use state::SocketState;
