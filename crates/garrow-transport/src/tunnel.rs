//! Tunnel endpoints: dialing a tunnel server and accepting tunnel clients.
//!
//! Every tunnel connection is `EncryptedStream<TimeoutStream<TcpStream>>`
//! with its own [`Cipher`]; only the derived [`Key`] is shared.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use garrow_core::defaults::{
    DEFAULT_CONN_IDLE_TIMEOUT_SECS, DEFAULT_CONNECTION_BACKLOG, DEFAULT_DIAL_TIMEOUT_SECS,
};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::cipher::{Cipher, Key};
use crate::encrypted::EncryptedStream;
use crate::error::TransportError;
use crate::tcp::{TcpOptions, apply_tcp_options, bind_listener};
use crate::timeout::TimeoutStream;
use crate::{TransportAcceptor, TransportConnector};

/// An established tunnel connection.
pub type TunnelStream = EncryptedStream<TimeoutStream<TcpStream>>;

/// Client-side tunnel settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialOptions {
    /// Bound on TCP connection establishment; zero waits indefinitely.
    pub connect_timeout: Duration,
    /// Idle deadline of the established connection; zero disables it.
    pub conn_idle_timeout: Duration,
    pub tcp: TcpOptions,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECS),
            conn_idle_timeout: Duration::from_secs(DEFAULT_CONN_IDLE_TIMEOUT_SECS),
            tcp: TcpOptions::default(),
        }
    }
}

/// Server-side tunnel settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenOptions {
    /// Idle deadline of accepted connections; zero disables it.
    pub conn_idle_timeout: Duration,
    pub backlog: u32,
    pub tcp: TcpOptions,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            conn_idle_timeout: Duration::from_secs(DEFAULT_CONN_IDLE_TIMEOUT_SECS),
            backlog: DEFAULT_CONNECTION_BACKLOG,
            tcp: TcpOptions::default(),
        }
    }
}

fn wrap(tcp: TcpStream, key: &Key, idle: Duration) -> Result<TunnelStream, TransportError> {
    let cipher = Cipher::from_key(key)?;
    Ok(EncryptedStream::new(TimeoutStream::new(tcp, idle), cipher))
}

/// Dials tunnel servers with a fixed key.
#[derive(Debug, Clone)]
pub struct TunnelConnector {
    key: Key,
    options: DialOptions,
}

impl TunnelConnector {
    pub fn new(password: &str, options: DialOptions) -> Result<Self, TransportError> {
        let key = Key::derive(password);
        Cipher::from_key(&key)?;
        Ok(Self { key, options })
    }

    pub fn options(&self) -> &DialOptions {
        &self.options
    }

    /// Open a tunnel connection to `addr` (`host:port`).
    pub async fn dial(&self, addr: &str) -> Result<TunnelStream, TransportError> {
        let connect = TcpStream::connect(addr);
        let tcp = if self.options.connect_timeout.is_zero() {
            connect.await?
        } else {
            tokio::time::timeout(self.options.connect_timeout, connect)
                .await
                .map_err(|_| TransportError::ConnectTimeout {
                    addr: addr.to_string(),
                })??
        };
        apply_tcp_options(&tcp, &self.options.tcp)?;
        debug!(remote = %addr, "tunnel connected");
        wrap(tcp, &self.key, self.options.conn_idle_timeout)
    }
}

impl TransportConnector for TunnelConnector {
    type Stream = TunnelStream;

    fn connect(
        &self,
        addr: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream, TransportError>> + Send + '_>> {
        let addr = addr.to_string();
        Box::pin(async move { self.dial(&addr).await })
    }
}

/// Wraps accepted TCP connections, deriving a fresh cipher for each one.
#[derive(Debug, Clone)]
pub struct TunnelAcceptor {
    key: Key,
    options: ListenOptions,
}

impl TunnelAcceptor {
    pub fn new(password: &str, options: ListenOptions) -> Result<Self, TransportError> {
        let key = Key::derive(password);
        Cipher::from_key(&key)?;
        Ok(Self { key, options })
    }

    pub fn wrap(&self, tcp: TcpStream) -> Result<TunnelStream, TransportError> {
        apply_tcp_options(&tcp, &self.options.tcp)?;
        wrap(tcp, &self.key, self.options.conn_idle_timeout)
    }
}

impl TransportAcceptor for TunnelAcceptor {
    type Stream = TunnelStream;

    fn accept(
        &self,
        tcp: TcpStream,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream, TransportError>> + Send + '_>> {
        Box::pin(async move { self.wrap(tcp) })
    }
}

/// A bound listener producing tunnel connections.
#[derive(Debug)]
pub struct TunnelListener {
    listener: TcpListener,
    acceptor: TunnelAcceptor,
}

impl TunnelListener {
    pub fn bind(
        addr: SocketAddr,
        password: &str,
        options: ListenOptions,
    ) -> Result<Self, TransportError> {
        let acceptor = TunnelAcceptor::new(password, options)?;
        let listener = bind_listener(addr, options.backlog)?;
        Ok(Self { listener, acceptor })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn acceptor(&self) -> &TunnelAcceptor {
        &self.acceptor
    }

    /// Accept the next connection and wrap it.
    pub async fn accept(&self) -> Result<(TunnelStream, SocketAddr), TransportError> {
        let (tcp, peer) = self.accept_tcp().await?;
        let stream = self.acceptor.wrap(tcp)?;
        Ok((stream, peer))
    }

    /// Accept the next raw connection, leaving the wrapping to the caller's
    /// task via [`acceptor`](Self::acceptor).
    pub async fn accept_tcp(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        Ok(self.listener.accept().await?)
    }
}

/// Dial `addr` with a one-off connector.
pub async fn dial(
    addr: &str,
    password: &str,
    options: &DialOptions,
) -> Result<TunnelStream, TransportError> {
    TunnelConnector::new(password, *options)?.dial(addr).await
}

/// Bind a tunnel listener on `addr`.
pub fn listen(
    addr: SocketAddr,
    password: &str,
    options: &ListenOptions,
) -> Result<TunnelListener, TransportError> {
    TunnelListener::bind(addr, password, *options)
}
