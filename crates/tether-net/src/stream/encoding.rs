//! Byte order and character set settings for [`ByteStream`](super::ByteStream).

use crate::error::StreamError;

/// Byte order applied to every multi-byte field of a stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first (network order).
    Big,
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Little => write!(f, "little-endian"),
            Self::Big => write!(f, "big-endian"),
        }
    }
}

/// Character set used for string payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Charset {
    /// UTF-8.
    #[default]
    Utf8,
    /// UTF-16 code units in the stream's byte order.
    Utf16,
    /// ISO-8859-1. Characters above U+00FF encode as `?`.
    Latin1,
}

impl Charset {
    /// Encode `text` into bytes.
    pub fn encode(self, text: &str, order: ByteOrder) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf16 => text
                .encode_utf16()
                .flat_map(|unit| match order {
                    ByteOrder::Big => unit.to_be_bytes(),
                    ByteOrder::Little => unit.to_le_bytes(),
                })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }

    /// Decode `bytes` into a string.
    pub fn decode(self, bytes: &[u8], order: ByteOrder) -> Result<String, StreamError> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| StreamError::InvalidString(e.to_string())),
            Self::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(StreamError::InvalidString(format!(
                        "odd byte count {} for UTF-16",
                        bytes.len()
                    )));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| match order {
                        ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
                        ByteOrder::Little => u16::from_le_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                String::from_utf16(&units).map_err(|e| StreamError::InvalidString(e.to_string()))
            }
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

impl std::fmt::Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utf8 => write!(f, "UTF-8"),
            Self::Utf16 => write!(f, "UTF-16"),
            Self::Latin1 => write!(f, "ISO-8859-1"),
        }
    }
}
