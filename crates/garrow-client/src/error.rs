//! Client error types.

use garrow_core::{
    ERROR_CONFIG, ERROR_DIAL, ERROR_FRAMING, ERROR_IO, ERROR_PROTOCOL, ERROR_TIMEOUT,
};
use garrow_proto::HandshakeError;
use garrow_transport::TransportError;

use crate::http::HttpError;

/// Errors that can occur in the garrow client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tunnel: {0}")]
    Transport(#[from] TransportError),

    #[error("handshake: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("http: {0}")]
    Http(#[from] HttpError),

    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    /// Get the error type string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            ClientError::Io(_) => ERROR_IO,
            ClientError::Transport(TransportError::ConnectTimeout { .. }) => ERROR_TIMEOUT,
            ClientError::Transport(TransportError::Framing { .. }) => ERROR_FRAMING,
            ClientError::Transport(TransportError::Config(_)) => ERROR_CONFIG,
            ClientError::Transport(TransportError::Io(_)) => ERROR_DIAL,
            ClientError::Transport(_) => ERROR_IO,
            ClientError::Handshake(HandshakeError::Framing(_)) => ERROR_FRAMING,
            ClientError::Handshake(HandshakeError::Io(_)) => ERROR_IO,
            ClientError::Handshake(_) => ERROR_PROTOCOL,
            ClientError::Http(HttpError::Io(_)) => ERROR_IO,
            ClientError::Http(_) => ERROR_PROTOCOL,
            ClientError::Config(_) => ERROR_CONFIG,
        }
    }
}

impl From<garrow_config::ConfigError> for ClientError {
    fn from(err: garrow_config::ConfigError) -> Self {
        ClientError::Config(err.to_string())
    }
}
