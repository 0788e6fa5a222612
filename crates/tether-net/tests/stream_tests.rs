//! Tests for the binary stream buffer.

use tether_net::{ByteOrder, ByteStream, Charset, StreamError};

#[test]
fn test_write_int_byte_order() {
    let mut big = ByteStream::new().with_byte_order(ByteOrder::Big);
    big.write_i32(0x01020304);
    assert_eq!(big.to_vec(), vec![0x01, 0x02, 0x03, 0x04]);

    let mut little = ByteStream::new();
    little.write_i32(0x01020304);
    assert_eq!(little.to_vec(), vec![0x04, 0x03, 0x02, 0x01]);
}

#[test]
fn test_bytes_round_trip() {
    let data: Vec<u8> = (0..=255).rev().collect();
    let mut stream = ByteStream::new();
    stream.write_bytes(&data);

    let mut out = vec![0u8; data.len()];
    assert_eq!(stream.read_bytes(&mut out), data.len());
    assert_eq!(out, data);
}

#[test]
fn test_string_round_trip() {
    for charset in [Charset::Utf8, Charset::Utf16] {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let mut stream = ByteStream::new().with_byte_order(order).with_charset(charset);
            for text in ["", "x", "héllo wörld ✓ 日本"] {
                stream.write_string(text).unwrap();
            }
            for text in ["", "x", "héllo wörld ✓ 日本"] {
                assert_eq!(stream.read_string().unwrap(), text, "{charset} {order}");
            }
            assert_eq!(stream.remaining(), 0);
        }
    }
}

#[test]
fn test_latin1_strings() {
    let mut stream = ByteStream::new().with_charset(Charset::Latin1);
    stream.write_string("café").unwrap();
    assert_eq!(stream.as_bytes(), &[4, 0, 0, 0, b'c', b'a', b'f', 0xE9]);
    assert_eq!(stream.read_string().unwrap(), "café");
}

#[test]
fn test_growth_keeps_prior_content() {
    let mut stream = ByteStream::with_capacity(8);
    stream.write_bytes(b"prefix");
    let capacity = stream.capacity();

    let tail = vec![0xAB; capacity * 3];
    stream.write_bytes(&tail);

    let mut expected = b"prefix".to_vec();
    expected.extend_from_slice(&tail);
    assert_eq!(stream.to_vec(), expected);
    assert!(stream.capacity() > capacity);
}

#[test]
fn test_partial_message_then_complete() {
    let mut message = ByteStream::new();
    message.write_u16(3);
    message.write_string("payload").unwrap();
    message.write_i64(-9);
    let encoded = message.freeze();

    let mut incoming = ByteStream::new();
    let (head, rest) = encoded.split_at(5);
    incoming.write_bytes(head);

    assert_eq!(incoming.read_u16(), Ok(3));
    assert!(matches!(incoming.read_string(), Err(StreamError::Underrun { .. })));
    assert_eq!(incoming.read_position(), 2);

    incoming.write_bytes(rest);
    assert_eq!(incoming.read_string().as_deref(), Ok("payload"));
    assert_eq!(incoming.read_i64(), Ok(-9));

    // Drop what was consumed, keeping nothing unread.
    let consumed = incoming.read_position();
    incoming.clear_range(0, consumed);
    assert!(incoming.is_empty());
    assert_eq!(incoming.read_position(), 0);
}

#[test]
fn test_trim_consumed_keeps_unread_tail() {
    let mut stream = ByteStream::new();
    stream.write_u32(1);
    stream.write_u32(2);
    assert_eq!(stream.read_u32(), Ok(1));

    stream.clear_range(0, stream.read_position());
    assert_eq!(stream.len(), 4);
    assert_eq!(stream.read_u32(), Ok(2));
}

#[test]
fn test_optional_strings() {
    let mut stream = ByteStream::new().with_byte_order(ByteOrder::Big);
    stream.write_optional_string(None).unwrap();
    stream.write_optional_string(Some("")).unwrap();
    stream.write_optional_string(Some("a")).unwrap();

    assert_eq!(&stream.as_bytes()[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(stream.read_optional_string(), Ok(None));
    assert_eq!(stream.read_optional_string(), Ok(Some(String::new())));
    assert_eq!(stream.read_optional_string(), Ok(Some("a".to_string())));
}

#[test]
fn test_invalid_utf8_payload() {
    let mut stream = ByteStream::new();
    stream.write_i32(2);
    stream.write_bytes(&[0xFF, 0xFE]);

    assert!(matches!(stream.read_string(), Err(StreamError::InvalidString(_))));
    assert_eq!(stream.read_position(), 0);
}

#[test]
fn test_replace_adjusts_read_cursor() {
    let mut stream = ByteStream::from_slice(&[1, 2, 3, 4, 5]);
    stream.set_read_position(4);

    stream.replace(0, 2, &[9]).unwrap();
    assert_eq!(stream.as_bytes(), &[9, 3, 4, 5]);
    assert_eq!(stream.read_u8(), Ok(5));
}

#[test]
fn test_io_write_and_read() {
    use std::io::{Read, Write};

    let mut stream = ByteStream::new();
    write!(stream, "n={}", 42).unwrap();

    let mut text = String::new();
    stream.read_to_string(&mut text).unwrap();
    assert_eq!(text, "n=42");
}

#[test]
fn test_conversions() {
    let stream = ByteStream::from(vec![1u8, 2, 3]);
    assert_eq!(stream.as_ref(), &[1, 2, 3]);
    assert_eq!(stream.write_position(), 3);

    let stream: ByteStream = (&[4u8, 5][..]).into();
    assert_eq!(stream.to_vec(), vec![4, 5]);
}
