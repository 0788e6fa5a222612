//! Networking module for Tether.
//!
//! This crate provides two independent pieces:
//!
//! - **Asynchronous TCP client**: [`AsyncSocket`] keeps one outbound
//!   connection, runs the blocking connect and receive on a background worker
//!   thread, and reports lifecycle and data events to a [`SocketListener`]
//! - **Binary stream buffer**: [`ByteStream`] encodes and decodes integers,
//!   characters, strings and raw byte ranges for the payloads carried over the
//!   socket
//!
//! # TCP Client
//!
//! ```no_run
//! use tether_net::{AsyncSocket, SocketConfig, SocketEvent, SocketHandle};
//!
//! let config = SocketConfig::new("127.0.0.1", 7000)
//!     .connect_timeout(std::time::Duration::from_secs(5))
//!     .no_delay(true);
//!
//! let socket = AsyncSocket::with_listener(config, |socket: &SocketHandle, event: &SocketEvent| {
//!     match event {
//!         SocketEvent::Connected => {
//!             socket.send(b"hello").ok();
//!         }
//!         SocketEvent::Received { bytes, count } => println!("{count} bytes: {bytes:?}"),
//!         SocketEvent::Interruption(reason) => println!("ended: {reason}"),
//!         SocketEvent::ConnectionFailed => println!("could not connect"),
//!     }
//! });
//!
//! socket.connect()?;
//! # Ok::<(), tether_net::NetworkError>(())
//! ```
//!
//! ## Callback Delivery
//!
//! Callbacks run on the worker thread by default ([`CallbackMode::Inline`]).
//! With [`CallbackMode::Marshalled`] every event is posted to a
//! [`MainContext`](tether_core::MainContext) instead and the listener runs on
//! whichever thread drains that context. Either way events arrive in the order
//! the worker produced them.
//!
//! # Byte Stream
//!
//! ```
//! use tether_net::{ByteOrder, ByteStream};
//!
//! let mut stream = ByteStream::new().with_byte_order(ByteOrder::Big);
//! stream.write_i32(0x01020304);
//! assert_eq!(stream.as_bytes(), &[1, 2, 3, 4]);
//! assert_eq!(stream.read_i32(), Ok(0x01020304));
//! ```

mod error;
pub mod stream;
pub mod tcp;

pub use error::{NetworkError, Result, StreamError};
pub use stream::{ByteOrder, ByteStream, Charset};
pub use tcp::{
    AsyncSocket, CallbackMode, DisconnectReason, SocketConfig, SocketEvent, SocketHandle,
    SocketListener, SocketState,
};
