//! Encrypted transport for garrow tunnels.
//!
//! Layers, innermost first:
//!
//! - [`tcp`]: socket options and listener setup.
//! - [`timeout`]: per-connection idle deadline.
//! - [`encrypted`]: AES-256-CFB stream encryption.
//! - [`tunnel`]: dial/listen factories that compose the layers.
//!
//! The [`TransportAcceptor`] and [`TransportConnector`] traits let the server
//! and client front-ends work with any stream type.

pub mod cipher;
pub mod encrypted;
pub mod error;
pub mod tcp;
pub mod timeout;
pub mod tunnel;

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

pub use cipher::{Cipher, IV_LEN, Iv, KEY_LEN, Key};
pub use encrypted::EncryptedStream;
pub use error::{Direction, TransportError};
pub use tcp::{TcpOptions, apply_tcp_options, bind_listener};
pub use timeout::TimeoutStream;
pub use tunnel::{
    DialOptions, ListenOptions, TunnelAcceptor, TunnelConnector, TunnelListener, TunnelStream,
    dial, listen,
};

/// Marker trait for streams usable by the relay.
pub trait TransportStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> TransportStream for T {}

/// Accepts inbound TCP connections and wraps them in a transport stream.
pub trait TransportAcceptor: Clone + Send + Sync + 'static {
    /// The stream type produced by this acceptor.
    type Stream: TransportStream;

    /// Accept and wrap a raw TCP connection.
    fn accept(
        &self,
        tcp: TcpStream,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream, TransportError>> + Send + '_>>;
}

/// Connects outbound to a target address, producing a transport stream.
pub trait TransportConnector: Clone + Send + Sync + 'static {
    /// The stream type produced by this connector.
    type Stream: TransportStream;

    /// Connect to the given `host:port` address.
    fn connect(
        &self,
        addr: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream, TransportError>> + Send + '_>>;
}
