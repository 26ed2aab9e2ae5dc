//! Server state shared across connections.

use std::time::Duration;

use garrow_config::Config;
use garrow_core::io::RelayOptions;
use garrow_transport::{ListenOptions, TcpOptions};

use crate::pool::{ConnectionPool, PoolConfig};

/// Shared server state for all connections.
#[derive(Debug)]
pub struct ServerState {
    pub pool: ConnectionPool,
    /// Upper bound on the handshake destination length.
    pub max_destination_len: usize,
    /// Bound on dialing a destination; zero waits indefinitely.
    pub dial_timeout: Duration,
    pub relay: RelayOptions,
}

impl ServerState {
    pub fn from_config(config: &Config) -> Self {
        let tunnel = &config.tunnel;
        Self {
            pool: ConnectionPool::with_config(PoolConfig {
                keep_alive: Duration::from_secs(tunnel.pool_keep_alive_secs),
                tcp: tcp_options(config),
            }),
            max_destination_len: tunnel.max_destination_len,
            dial_timeout: Duration::from_secs(tunnel.dial_timeout_secs),
            relay: RelayOptions::new(
                Duration::from_secs(tunnel.relay_idle_timeout_secs),
                tunnel.relay_chunk_size,
            ),
        }
    }
}

pub(crate) fn tcp_options(config: &Config) -> TcpOptions {
    TcpOptions::new(config.tcp.no_delay, config.tcp.keepalive_secs)
}

pub(crate) fn listen_options(config: &Config) -> ListenOptions {
    ListenOptions {
        conn_idle_timeout: Duration::from_secs(config.tunnel.conn_idle_timeout_secs),
        backlog: config.tunnel.connection_backlog,
        tcp: tcp_options(config),
    }
}
