//! Tunnel establishment to the remote garrow server.

use std::time::Duration;

use garrow_config::Config;
use garrow_core::io::RelayOptions;
use garrow_proto::write_handshake;
use garrow_transport::{DialOptions, TcpOptions, TransportConnector, TunnelConnector};
use tracing::debug;

use crate::error::ClientError;

/// Shared client state for opening tunnels.
#[derive(Debug)]
pub struct ClientState<C = TunnelConnector> {
    pub connector: C,
    /// Remote garrow server address (host:port).
    pub remote: String,
    pub relay: RelayOptions,
    /// Upper bound on a buffered HTTP request head.
    pub max_header_bytes: usize,
}

impl ClientState {
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let tunnel = &config.tunnel;
        let options = DialOptions {
            connect_timeout: Duration::from_secs(tunnel.dial_timeout_secs),
            conn_idle_timeout: Duration::from_secs(tunnel.conn_idle_timeout_secs),
            tcp: TcpOptions::new(config.tcp.no_delay, config.tcp.keepalive_secs),
        };
        Ok(Self {
            connector: TunnelConnector::new(&config.password, options)?,
            remote: config.server.clone(),
            relay: RelayOptions::new(
                Duration::from_secs(tunnel.relay_idle_timeout_secs),
                tunnel.relay_chunk_size,
            ),
            max_header_bytes: tunnel.max_header_bytes,
        })
    }
}

impl<C: TransportConnector> ClientState<C> {
    /// Dial the remote server and declare `destination`. The returned stream
    /// is ready to carry the destination's bytes.
    pub async fn open_tunnel(&self, destination: &str) -> Result<C::Stream, ClientError> {
        let mut tunnel = self.connector.connect(&self.remote).await?;
        write_handshake(&mut tunnel, destination).await?;
        debug!(remote = %self.remote, destination = %destination, "tunnel opened");
        Ok(tunnel)
    }
}
