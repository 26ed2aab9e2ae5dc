//! garrow tunnel handshake parsing and serialization.
//!
//! After the encrypted channel is up, the client sends exactly one handshake
//! naming the destination the server should connect to:
//!
//! ```text
//! +----------------------+---------------------+
//! | length (int64, LE)   | destination (UTF-8) |
//! +----------------------+---------------------+
//! |          8           |       length        |
//! +----------------------+---------------------+
//! ```
//!
//! The destination is a `host:port` string. A destination without a port is
//! normalized to port 80 before it is used.

use std::borrow::Cow;

use bytes::{BufMut, BytesMut};
use garrow_core::{DEFAULT_DESTINATION_PORT, DEFAULT_MAX_DESTINATION_LEN};

mod io;

pub use io::{Handshake, HandshakeError, read_handshake, write_handshake};

/// Size of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("negative destination length")]
    NegativeLength,
    #[error("empty destination")]
    EmptyDestination,
    #[error("destination length exceeds limit")]
    DestinationTooLong,
    #[error("destination is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors that can occur when writing a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("empty destination")]
    EmptyDestination,
    /// Destination exceeds [`DEFAULT_MAX_DESTINATION_LEN`].
    #[error("destination too long")]
    DestinationTooLong,
}

/// Parse result for incremental parsing.
///
/// - `Complete(T)` - parsing succeeded, contains the parsed value.
/// - `Incomplete(n)` - buffer too small; `n` is the **minimum total bytes** needed
///   (not the additional bytes needed). Caller should accumulate more data and retry.
/// - `Invalid(e)` - protocol violation, connection should be closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult<T> {
    Complete(T),
    Incomplete(usize),
    Invalid(ParseError),
}

/// A handshake borrowed from a receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRef<'a> {
    /// Destination exactly as sent.
    pub destination: &'a str,
    /// Bytes consumed from the buffer (prefix plus destination).
    pub header_len: usize,
}

impl HandshakeRef<'_> {
    /// Destination with an explicit port.
    pub fn normalized(&self) -> Cow<'_, str> {
        normalize_destination(self.destination)
    }
}

/// Append `:80` to a destination that carries no port.
///
/// Bracketed IPv6 literals are handled: `[::1]` becomes `[::1]:80` while
/// `[::1]:443` is left alone.
pub fn normalize_destination(destination: &str) -> Cow<'_, str> {
    let has_port = match destination.strip_prefix('[') {
        Some(rest) => rest.find(']').is_some_and(|end| rest[end + 1..].starts_with(':')),
        None => destination.contains(':'),
    };
    if has_port {
        Cow::Borrowed(destination)
    } else {
        Cow::Owned(format!("{destination}:{DEFAULT_DESTINATION_PORT}"))
    }
}

/// Validate a length prefix against `max_len`.
pub fn decode_length(
    prefix: [u8; LENGTH_PREFIX_LEN],
    max_len: usize,
) -> Result<usize, ParseError> {
    let len = i64::from_le_bytes(prefix);
    if len < 0 {
        return Err(ParseError::NegativeLength);
    }
    if len == 0 {
        return Err(ParseError::EmptyDestination);
    }
    match usize::try_from(len) {
        Ok(len) if len <= max_len => Ok(len),
        _ => Err(ParseError::DestinationTooLong),
    }
}

/// Parse a handshake from the start of `buf`.
///
/// Length violations are reported as soon as the prefix is available, before
/// any destination bytes are required.
pub fn parse_handshake(buf: &[u8], max_len: usize) -> ParseResult<HandshakeRef<'_>> {
    let Some(prefix) = buf.first_chunk::<LENGTH_PREFIX_LEN>() else {
        return ParseResult::Incomplete(LENGTH_PREFIX_LEN);
    };
    let len = match decode_length(*prefix, max_len) {
        Ok(len) => len,
        Err(e) => return ParseResult::Invalid(e),
    };
    let header_len = LENGTH_PREFIX_LEN + len;
    if buf.len() < header_len {
        return ParseResult::Incomplete(header_len);
    }
    match std::str::from_utf8(&buf[LENGTH_PREFIX_LEN..header_len]) {
        Ok(destination) => ParseResult::Complete(HandshakeRef {
            destination,
            header_len,
        }),
        Err(_) => ParseResult::Invalid(ParseError::InvalidUtf8),
    }
}

/// Append a handshake for `destination` (normalized first) to `buf`.
pub fn encode_handshake(buf: &mut BytesMut, destination: &str) -> Result<(), WriteError> {
    if destination.is_empty() {
        return Err(WriteError::EmptyDestination);
    }
    let destination = normalize_destination(destination);
    if destination.len() > DEFAULT_MAX_DESTINATION_LEN {
        return Err(WriteError::DestinationTooLong);
    }
    buf.reserve(LENGTH_PREFIX_LEN + destination.len());
    buf.put_i64_le(destination.len() as i64);
    buf.put_slice(destination.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(len: i64) -> Vec<u8> {
        len.to_le_bytes().to_vec()
    }

    #[test]
    fn parse_handshake_without_port() {
        let mut buf = prefix(5);
        buf.extend_from_slice(b"a.com");

        match parse_handshake(&buf, DEFAULT_MAX_DESTINATION_LEN) {
            ParseResult::Complete(hs) => {
                assert_eq!(hs.destination, "a.com");
                assert_eq!(hs.normalized(), "a.com:80");
                assert_eq!(hs.header_len, 13);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_handshake_leaves_trailing_bytes() {
        let mut buf = BytesMut::new();
        encode_handshake(&mut buf, "example.com:443").unwrap();
        buf.extend_from_slice(b"GET / HTTP/1.1\r\n");

        let ParseResult::Complete(hs) = parse_handshake(&buf, DEFAULT_MAX_DESTINATION_LEN) else {
            panic!("expected complete handshake");
        };
        assert_eq!(hs.destination, "example.com:443");
        assert_eq!(&buf[hs.header_len..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn parse_handshake_incomplete() {
        assert_eq!(
            parse_handshake(&[0u8; 3], DEFAULT_MAX_DESTINATION_LEN),
            ParseResult::Incomplete(LENGTH_PREFIX_LEN)
        );

        let mut buf = prefix(11);
        buf.extend_from_slice(b"exam");
        assert_eq!(
            parse_handshake(&buf, DEFAULT_MAX_DESTINATION_LEN),
            ParseResult::Incomplete(19)
        );
    }

    #[test]
    fn parse_handshake_rejects_bad_lengths() {
        assert_eq!(
            parse_handshake(&prefix(-1), DEFAULT_MAX_DESTINATION_LEN),
            ParseResult::Invalid(ParseError::NegativeLength)
        );
        assert_eq!(
            parse_handshake(&prefix(0), DEFAULT_MAX_DESTINATION_LEN),
            ParseResult::Invalid(ParseError::EmptyDestination)
        );
        // Rejected from the prefix alone, no body needed.
        assert_eq!(
            parse_handshake(&prefix(4097), DEFAULT_MAX_DESTINATION_LEN),
            ParseResult::Invalid(ParseError::DestinationTooLong)
        );
        assert_eq!(
            parse_handshake(&prefix(i64::MAX), DEFAULT_MAX_DESTINATION_LEN),
            ParseResult::Invalid(ParseError::DestinationTooLong)
        );
    }

    #[test]
    fn parse_handshake_rejects_invalid_utf8() {
        let mut buf = prefix(2);
        buf.extend_from_slice(&[0xff, 0xfe]);
        assert_eq!(
            parse_handshake(&buf, DEFAULT_MAX_DESTINATION_LEN),
            ParseResult::Invalid(ParseError::InvalidUtf8)
        );
    }

    #[test]
    fn normalize_destination_cases() {
        assert_eq!(normalize_destination("a.com"), "a.com:80");
        assert_eq!(normalize_destination("a.com:8080"), "a.com:8080");
        assert_eq!(normalize_destination("10.0.0.1"), "10.0.0.1:80");
        assert_eq!(normalize_destination("[::1]"), "[::1]:80");
        assert_eq!(normalize_destination("[::1]:443"), "[::1]:443");
        assert!(matches!(
            normalize_destination("host:1"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn encode_handshake_normalizes() {
        let mut buf = BytesMut::new();
        encode_handshake(&mut buf, "a.com").unwrap();
        assert_eq!(&buf[..LENGTH_PREFIX_LEN], &8i64.to_le_bytes());
        assert_eq!(&buf[LENGTH_PREFIX_LEN..], b"a.com:80");
    }

    #[test]
    fn encode_handshake_rejects_bad_destinations() {
        let mut buf = BytesMut::new();
        assert_eq!(
            encode_handshake(&mut buf, ""),
            Err(WriteError::EmptyDestination)
        );
        let long = format!("{}:80", "a".repeat(DEFAULT_MAX_DESTINATION_LEN));
        assert_eq!(
            encode_handshake(&mut buf, &long),
            Err(WriteError::DestinationTooLong)
        );
        assert!(buf.is_empty());
    }
}
