//! Server error types.

use garrow_core::{
    ERROR_CONFIG, ERROR_DIAL, ERROR_FRAMING, ERROR_IO, ERROR_PROTOCOL, ERROR_RESOLVE,
    ERROR_TIMEOUT,
};
use garrow_proto::HandshakeError;
use garrow_transport::TransportError;

use crate::pool::PoolError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("handshake: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("pool: {0}")]
    Pool(#[from] PoolError),
    #[error("config: {0}")]
    Config(String),
}

impl ServerError {
    /// Get the error type string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Io(_) => ERROR_IO,
            ServerError::Transport(TransportError::Framing { .. }) => ERROR_FRAMING,
            ServerError::Transport(TransportError::ConnectTimeout { .. }) => ERROR_TIMEOUT,
            ServerError::Transport(TransportError::Config(_)) => ERROR_CONFIG,
            ServerError::Transport(_) => ERROR_IO,
            ServerError::Handshake(HandshakeError::Framing(_)) => ERROR_FRAMING,
            ServerError::Handshake(HandshakeError::Io(_)) => ERROR_IO,
            ServerError::Handshake(_) => ERROR_PROTOCOL,
            ServerError::Pool(PoolError::Resolve { .. }) => ERROR_RESOLVE,
            ServerError::Pool(PoolError::Dial { .. }) => ERROR_DIAL,
            ServerError::Pool(PoolError::DialTimeout { .. }) => ERROR_TIMEOUT,
            ServerError::Config(_) => ERROR_CONFIG,
        }
    }
}

impl From<garrow_config::ConfigError> for ServerError {
    fn from(err: garrow_config::ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrow_proto::ParseError;
    use std::io;

    #[test]
    fn error_types() {
        let framing: ServerError =
            HandshakeError::Framing(io::ErrorKind::UnexpectedEof.into()).into();
        assert_eq!(framing.error_type(), ERROR_FRAMING);

        let protocol: ServerError = HandshakeError::Protocol(ParseError::NegativeLength).into();
        assert_eq!(protocol.error_type(), ERROR_PROTOCOL);

        let resolve: ServerError = PoolError::Resolve {
            destination: "x:1".into(),
            source: io::ErrorKind::NotFound.into(),
        }
        .into();
        assert_eq!(resolve.error_type(), ERROR_RESOLVE);

        let config: ServerError = garrow_config::ConfigError::Validation("bad".into()).into();
        assert_eq!(config.error_type(), ERROR_CONFIG);
        assert_eq!(config.to_string(), "config: validation: bad");
    }
}
