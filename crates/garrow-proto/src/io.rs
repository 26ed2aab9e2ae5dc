//! Async handshake exchange over an established tunnel stream.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    LENGTH_PREFIX_LEN, ParseError, ParseResult, WriteError, encode_handshake, parse_handshake,
};

/// A received handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Destination with an explicit port.
    pub destination: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// Peer closed before a complete handshake arrived.
    #[error("framing: {0}")]
    Framing(#[source] io::Error),
    #[error("protocol: {0}")]
    Protocol(#[from] ParseError),
    #[error("encode: {0}")]
    Write(#[from] WriteError),
    #[error("io: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for HandshakeError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            HandshakeError::Framing(err)
        } else {
            HandshakeError::Io(err)
        }
    }
}

/// Send the handshake for `destination`.
pub async fn write_handshake<W>(writer: &mut W, destination: &str) -> Result<(), HandshakeError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + destination.len() + 3);
    encode_handshake(&mut buf, destination)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one handshake.
///
/// Reads exactly as many bytes as [`parse_handshake`] asks for: the 8-byte
/// prefix first, which is validated against `max_len`, then the destination.
/// Nothing past the handshake is consumed.
pub async fn read_handshake<R>(reader: &mut R, max_len: usize) -> Result<Handshake, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut buf).await?;
    loop {
        let needed = match parse_handshake(&buf, max_len) {
            ParseResult::Complete(handshake) => {
                return Ok(Handshake {
                    destination: handshake.normalized().into_owned(),
                });
            }
            ParseResult::Incomplete(needed) => needed,
            ParseResult::Invalid(err) => return Err(err.into()),
        };
        let have = buf.len();
        buf.resize(needed, 0);
        reader.read_exact(&mut buf[have..]).await?;
    }
}
