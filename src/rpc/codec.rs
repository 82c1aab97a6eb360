//! Length-prefixed message framing and RPC header helpers.
//!
//! ```text
//! +------------+----------------------+-------------------+
//! | flag (u8)  | length (u32, BE)     | payload (length)  |
//! +------------+----------------------+-------------------+
//! ```
//!
//! Only uncompressed, single-message bodies are supported.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the flag + length prefix.
pub const HEADER_LEN: usize = 5;

/// Error type for frame decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("message frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("compressed messages are not supported")]
    Compressed,
    #[error("invalid compression flag {0}")]
    InvalidFlag(u8),
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// Frame `payload` as one uncompressed message.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(0);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Extract the single message carried in `body`.
///
/// An empty body is read as an empty message.
pub fn decode(body: &Bytes) -> Result<Bytes, FrameError> {
    if body.is_empty() {
        return Ok(Bytes::new());
    }
    if body.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            expected: HEADER_LEN,
            actual: body.len(),
        });
    }

    match body[0] {
        0 => {}
        1 => return Err(FrameError::Compressed),
        other => return Err(FrameError::InvalidFlag(other)),
    }

    let len = u32::from_be_bytes([body[1], body[2], body[3], body[4]]) as usize;
    let end = HEADER_LEN + len;
    if body.len() < end {
        return Err(FrameError::Truncated {
            expected: end,
            actual: body.len(),
        });
    }
    if body.len() > end {
        return Err(FrameError::TrailingBytes(body.len() - end));
    }

    Ok(body.slice(HEADER_LEN..end))
}

/// Parse a `grpc-timeout` value: up to eight ASCII digits followed by one of
/// `H`, `M`, `S`, `m`, `u`, `n`.
pub fn parse_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 || value.len() > 9 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount.checked_mul(3600)?),
        "M" => Duration::from_secs(amount.checked_mul(60)?),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

/// Percent-encode a status message for the `grpc-message` field.
pub fn encode_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for byte in message.bytes() {
        if (0x20..=0x7e).contains(&byte) && byte != b'%' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Reverse of [`encode_message`]. Malformed escapes are kept literally.
pub fn decode_message(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
