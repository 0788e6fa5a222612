//! Growable binary buffer for building and parsing socket payloads.
//!
//! [`ByteStream`] keeps the written bytes, a read cursor for sequential
//! decoding and the encoding settings applied to every multi-byte field:
//!
//! - [`ByteOrder`]: little-endian (default) or big-endian integers
//! - [`Charset`]: UTF-8 (default), UTF-16 or Latin-1 string payloads
//!
//! Strings are written as a 4-byte signed length prefix holding the encoded
//! byte count, followed by the encoded bytes. A prefix of `-1` marks an absent
//! string (see [`ByteStream::write_optional_string`]).
//!
//! # Example
//!
//! ```
//! use tether_net::stream::{ByteOrder, ByteStream};
//!
//! let mut out = ByteStream::new().with_byte_order(ByteOrder::Big);
//! out.write_u16(7);
//! out.write_string("hello").unwrap();
//!
//! let mut input = ByteStream::from_slice(out.as_bytes()).with_byte_order(ByteOrder::Big);
//! assert_eq!(input.read_u16(), Ok(7));
//! assert_eq!(input.read_string().as_deref(), Ok("hello"));
//!
//! // Incomplete data is reported, not fatal; the cursor stays put.
//! assert!(input.read_u32().is_err());
//! assert_eq!(input.remaining(), 0);
//! ```

mod byte_stream;
mod encoding;

pub use byte_stream::{ByteStream, DEFAULT_EXPAND_SIZE};
pub use encoding::{ByteOrder, Charset};
