//! The [`ByteStream`] buffer.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tether_core::logging::targets;

use super::encoding::{ByteOrder, Charset};
use crate::error::StreamError;

/// Slack added on top of the required size whenever the buffer grows.
pub const DEFAULT_EXPAND_SIZE: usize = 128;

/// Length prefix marking an absent string.
const ABSENT_STRING: i32 = -1;

/// A growable byte buffer with sequential, position-tracked encoding and
/// decoding.
///
/// Writes always append at the write position (the end of the written data)
/// and grow the backing storage geometrically. Reads advance a separate read
/// cursor and never change the written data. A read that needs more bytes than
/// are available fails with [`StreamError::Underrun`] and leaves the cursor
/// where it was.
///
/// Invariant: `read_position() <= len() <= capacity()`.
pub struct ByteStream {
    buf: BytesMut,
    read_pos: usize,
    order: ByteOrder,
    charset: Charset,
}

/// Generates a matching append/read pair for a fixed-width integer.
macro_rules! number_codec {
    ($($ty:ty => $write:ident, $read:ident,
        $put_be:ident, $put_le:ident, $get_be:ident, $get_le:ident;)*) => {
        $(
            #[doc = concat!("Append a `", stringify!($ty), "` in the stream's byte order.")]
            pub fn $write(&mut self, value: $ty) {
                self.ensure_capacity(std::mem::size_of::<$ty>());
                match self.order {
                    ByteOrder::Big => self.buf.$put_be(value),
                    ByteOrder::Little => self.buf.$put_le(value),
                }
            }

            #[doc = concat!("Read a `", stringify!($ty), "` in the stream's byte order.")]
            pub fn $read(&mut self) -> Result<$ty, StreamError> {
                let order = self.order;
                let mut src = self.take(std::mem::size_of::<$ty>())?;
                Ok(match order {
                    ByteOrder::Big => src.$get_be(),
                    ByteOrder::Little => src.$get_le(),
                })
            }
        )*
    };
}

impl Default for ByteStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStream {
    /// Create an empty stream with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EXPAND_SIZE)
    }

    /// Create an empty stream with at least `capacity` bytes preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            read_pos: 0,
            order: ByteOrder::default(),
            charset: Charset::default(),
        }
    }

    /// Create a stream holding a copy of `data`, positioned for reading from
    /// the start.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut stream = Self::with_capacity(data.len() + DEFAULT_EXPAND_SIZE);
        stream.buf.extend_from_slice(data);
        stream
    }

    /// Set the byte order used for multi-byte fields.
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Set the charset used for strings.
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Get the byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Change the byte order for subsequent reads and writes.
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Get the charset.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Change the charset for subsequent string reads and writes.
    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Number of written bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.read_pos
    }

    /// Current read cursor.
    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    /// Current write cursor. Writes always append, so this equals [`len`](Self::len).
    pub fn write_position(&self) -> usize {
        self.buf.len()
    }

    /// Move the read cursor.
    ///
    /// Positions outside `0..=len()` are ignored; returns whether the cursor moved.
    pub fn set_read_position(&mut self, position: usize) -> bool {
        if position > self.buf.len() {
            return false;
        }
        self.read_pos = position;
        true
    }

    /// Move the read cursor back to the start.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    /// The written bytes, excluding unused capacity.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Copy the written bytes into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.to_vec()
    }

    /// Convert the written bytes into an immutable [`Bytes`] without copying.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Grow the backing storage so that `additional` more bytes fit.
    ///
    /// Growth at least doubles the capacity and always leaves
    /// [`DEFAULT_EXPAND_SIZE`] bytes of slack past the pending write.
    fn ensure_capacity(&mut self, additional: usize) {
        let len = self.buf.len();
        let capacity = self.buf.capacity();
        if capacity - len >= additional {
            return;
        }
        let new_capacity = (capacity * 2).max(len + additional + DEFAULT_EXPAND_SIZE);
        tracing::trace!(target: targets::STREAM, capacity, new_capacity, "growing stream");
        self.buf.reserve(new_capacity - len);
    }

    /// Append raw bytes.
    fn append(&mut self, data: &[u8]) {
        self.ensure_capacity(data.len());
        self.buf.put_slice(data);
    }

    /// Borrow the next `count` unread bytes and advance the read cursor.
    fn take(&mut self, count: usize) -> Result<&[u8], StreamError> {
        let available = self.remaining();
        if count > available {
            return Err(StreamError::Underrun {
                needed: count,
                available,
            });
        }
        let start = self.read_pos;
        self.read_pos += count;
        Ok(&self.buf[start..start + count])
    }

    /// Run a multi-step read, restoring the read cursor if any step fails.
    fn atomically<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, StreamError>,
    ) -> Result<T, StreamError> {
        let start = self.read_pos;
        let result = read(self);
        if result.is_err() {
            self.read_pos = start;
        }
        result
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Append a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.ensure_capacity(1);
        self.buf.put_u8(value);
    }

    /// Append a single signed byte.
    pub fn write_i8(&mut self, value: i8) {
        self.ensure_capacity(1);
        self.buf.put_i8(value);
    }

    number_codec! {
        u16 => write_u16, read_u16, put_u16, put_u16_le, get_u16, get_u16_le;
        i16 => write_i16, read_i16, put_i16, put_i16_le, get_i16, get_i16_le;
        u32 => write_u32, read_u32, put_u32, put_u32_le, get_u32, get_u32_le;
        i32 => write_i32, read_i32, put_i32, put_i32_le, get_i32, get_i32_le;
        u64 => write_u64, read_u64, put_u64, put_u64_le, get_u64, get_u64_le;
        i64 => write_i64, read_i64, put_i64, put_i64_le, get_i64, get_i64_le;
    }

    /// Append a character as UTF-16 code units (2 bytes, or 4 for characters
    /// outside the Basic Multilingual Plane).
    pub fn write_char(&mut self, value: char) {
        let mut units = [0u16; 2];
        for unit in value.encode_utf16(&mut units) {
            self.write_u16(*unit);
        }
    }

    /// Append raw bytes without a length prefix.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.append(data);
    }

    /// Append a string as a 4-byte length prefix followed by its encoding in
    /// the stream's charset. The prefix holds the encoded byte count.
    pub fn write_string(&mut self, value: &str) -> Result<(), StreamError> {
        let encoded = self.charset.encode(value, self.order);
        let len = i32::try_from(encoded.len()).map_err(|_| StreamError::TooLong(encoded.len()))?;
        self.write_i32(len);
        self.append(&encoded);
        Ok(())
    }

    /// Append a string that may be absent. `None` is written as a length
    /// prefix of `-1` with no payload, so it stays distinguishable from `""`.
    pub fn write_optional_string(&mut self, value: Option<&str>) -> Result<(), StreamError> {
        match value {
            Some(value) => self.write_string(value),
            None => {
                self.write_i32(ABSENT_STRING);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        self.take(1).map(|bytes| bytes[0])
    }

    /// Read a single signed byte.
    pub fn read_i8(&mut self) -> Result<i8, StreamError> {
        self.take(1).map(|mut bytes| bytes.get_i8())
    }

    /// Read a character written by [`write_char`](Self::write_char).
    pub fn read_char(&mut self) -> Result<char, StreamError> {
        self.atomically(|stream| {
            let first = stream.read_u16()?;
            let units = if (0xD800..0xDC00).contains(&first) {
                vec![first, stream.read_u16()?]
            } else {
                vec![first]
            };
            char::decode_utf16(units)
                .next()
                .and_then(|decoded| decoded.ok())
                .ok_or(StreamError::InvalidChar(first))
        })
    }

    /// Copy up to `dest.len()` unread bytes into `dest`.
    ///
    /// Returns how many bytes were copied, which is short when fewer bytes
    /// are available.
    pub fn read_bytes(&mut self, dest: &mut [u8]) -> usize {
        let count = dest.len().min(self.remaining());
        let start = self.read_pos;
        dest[..count].copy_from_slice(&self.buf[start..start + count]);
        self.read_pos += count;
        count
    }

    /// Read up to `len` unread bytes into a new vector.
    pub fn read_vec(&mut self, len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len.min(self.remaining())];
        self.read_bytes(&mut data);
        data
    }

    /// Read a string written by [`write_string`](Self::write_string).
    ///
    /// An absent string (length prefix `-1`) reads as `""`; use
    /// [`read_optional_string`](Self::read_optional_string) to tell them apart.
    pub fn read_string(&mut self) -> Result<String, StreamError> {
        self.read_optional_string().map(Option::unwrap_or_default)
    }

    /// Read a string written by [`write_optional_string`](Self::write_optional_string).
    pub fn read_optional_string(&mut self) -> Result<Option<String>, StreamError> {
        self.atomically(|stream| {
            let len = stream.read_i32()?;
            if len == ABSENT_STRING {
                return Ok(None);
            }
            let len = usize::try_from(len).map_err(|_| StreamError::NegativeLength(len))?;
            let (charset, order) = (stream.charset, stream.order);
            let payload = stream.take(len)?;
            charset.decode(payload, order).map(Some)
        })
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Discard all data and reset both cursors.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.read_pos = 0;
    }

    /// Remove `len` bytes starting at `start`, shifting later bytes left.
    ///
    /// The range is clamped to the written data. The read cursor keeps
    /// pointing at the same unread byte; if it was inside the removed range
    /// it moves to `start`.
    pub fn clear_range(&mut self, start: usize, len: usize) {
        let size = self.buf.len();
        if start >= size || len == 0 {
            return;
        }
        let len = len.min(size - start);
        let end = start + len;

        self.buf.copy_within(end.., start);
        self.buf.truncate(size - len);

        self.read_pos = if self.read_pos >= end {
            self.read_pos - len
        } else {
            self.read_pos.min(start)
        };
        tracing::trace!(
            target: targets::STREAM,
            start,
            len,
            remaining = self.remaining(),
            "cleared range"
        );
    }

    /// Replace the `len` bytes at `offset` with `data`, growing or shrinking
    /// the stream as needed.
    pub fn replace(&mut self, offset: usize, len: usize, data: &[u8]) -> Result<(), StreamError> {
        let size = self.buf.len();
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(StreamError::OutOfBounds { offset, len, size });
        }

        let tail = self.buf.split_off(offset + len);
        self.buf.truncate(offset);
        self.ensure_capacity(data.len() + tail.len());
        self.buf.put_slice(data);
        self.buf.put_slice(&tail);

        if self.read_pos >= offset + len {
            self.read_pos = self.read_pos - len + data.len();
        } else if self.read_pos > offset {
            self.read_pos = offset;
        }
        Ok(())
    }

    /// Overwrite one byte at `offset`.
    pub fn replace_u8(&mut self, offset: usize, value: u8) -> Result<(), StreamError> {
        self.overwrite(offset, &[value])
    }

    /// Overwrite a 2-byte field at `offset` using the stream's byte order.
    pub fn replace_i16(&mut self, offset: usize, value: i16) -> Result<(), StreamError> {
        let bytes = match self.order {
            ByteOrder::Big => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        };
        self.overwrite(offset, &bytes)
    }

    /// Overwrite a 4-byte field at `offset` using the stream's byte order.
    ///
    /// Useful for back-patching a length header once the body is written.
    pub fn replace_i32(&mut self, offset: usize, value: i32) -> Result<(), StreamError> {
        let bytes = match self.order {
            ByteOrder::Big => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        };
        self.overwrite(offset, &bytes)
    }

    fn overwrite(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StreamError> {
        let size = self.buf.len();
        let Some(end) = offset.checked_add(bytes.len()).filter(|end| *end <= size) else {
            return Err(StreamError::OutOfBounds {
                offset,
                len: bytes.len(),
                size,
            });
        };
        self.buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl From<&[u8]> for ByteStream {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl From<Vec<u8>> for ByteStream {
    fn from(data: Vec<u8>) -> Self {
        Self::from_slice(&data)
    }
}

impl AsRef<[u8]> for ByteStream {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl io::Write for ByteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf))
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("read_position", &self.read_pos)
            .field("byte_order", &self.order)
            .field("charset", &self.charset)
            .finish()
    }
}
