//! Error types for the transport crate.

use std::fmt;
use std::io;

use thiserror::Error;

/// Keystream direction of a [`Cipher`](crate::Cipher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encrypt => f.write_str("encrypt"),
            Direction::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Errors that can occur in transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    /// The peer closed before sending its full IV.
    #[error("framing error: stream ended after {received} of {expected} IV bytes")]
    Framing { received: usize, expected: usize },

    #[error("{0} keystream already initialized")]
    KeystreamReinitialized(Direction),

    #[error("{0} keystream not initialized")]
    KeystreamUninitialized(Direction),

    #[error("connect to {addr} timed out")]
    ConnectTimeout { addr: String },
}

impl TransportError {
    /// Whether an I/O error raised by an encrypted stream carries a framing
    /// failure.
    pub fn is_framing(err: &io::Error) -> bool {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<TransportError>())
            .is_some_and(|inner| matches!(inner, TransportError::Framing { .. }))
    }
}

impl From<TransportError> for io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(e) => e,
            err @ TransportError::Framing { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            err @ TransportError::ConnectTimeout { .. } => io::Error::new(io::ErrorKind::TimedOut, err),
            err => io::Error::other(err),
        }
    }
}
