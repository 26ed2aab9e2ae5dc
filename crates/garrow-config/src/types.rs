//! Configuration type definitions.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

/// Top-level configuration shared by the server and client binaries.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tunnel server address. The server listens here, the client dials it.
    pub server: String,
    /// HTTP proxy listen address (client only).
    #[serde(default)]
    pub local: Option<String>,
    /// Shared secret from which the cipher key is derived.
    pub password: String,
    #[serde(default)]
    pub tunnel: TunnelConfig,
    #[serde(default)]
    pub tcp: TcpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("local", &self.local)
            .field("password", &"<redacted>")
            .field("tunnel", &self.tunnel)
            .field("tcp", &self.tcp)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Timeouts and limits of the tunnel itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Relay idle timeout in seconds (no traffic in either direction).
    #[serde(default = "default_relay_idle_timeout_secs")]
    pub relay_idle_timeout_secs: u64,
    /// Per-connection idle deadline of tunnel sockets (0 = disabled).
    #[serde(default = "default_conn_idle_timeout_secs")]
    pub conn_idle_timeout_secs: u64,
    /// Timeout for dialing the tunnel server or a destination.
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
    /// How long a released destination connection stays reusable.
    #[serde(default = "default_pool_keep_alive_secs")]
    pub pool_keep_alive_secs: u64,
    /// Maximum bytes moved per relay read.
    #[serde(default = "default_relay_chunk_size")]
    pub relay_chunk_size: usize,
    /// Upper bound on the handshake destination length.
    #[serde(default = "default_max_destination_len")]
    pub max_destination_len: usize,
    /// Upper bound on an HTTP request head accepted by the client.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Listener backlog.
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            relay_idle_timeout_secs: default_relay_idle_timeout_secs(),
            conn_idle_timeout_secs: default_conn_idle_timeout_secs(),
            dial_timeout_secs: default_dial_timeout_secs(),
            pool_keep_alive_secs: default_pool_keep_alive_secs(),
            relay_chunk_size: default_relay_chunk_size(),
            max_destination_len: default_max_destination_len(),
            max_header_bytes: default_max_header_bytes(),
            connection_backlog: default_connection_backlog(),
        }
    }
}

/// TCP socket configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY).
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// TCP Keep-Alive interval in seconds (0 = disabled).
    #[serde(default = "default_tcp_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            keepalive_secs: default_tcp_keepalive_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"garrow_server": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
