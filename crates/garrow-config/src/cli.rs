//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override tunnel server address, e.g. 0.0.0.0:8443
    #[arg(long)]
    pub server: Option<String>,
    /// Override HTTP proxy listen address, e.g. 127.0.0.1:8080
    #[arg(long)]
    pub local: Option<String>,
    /// Override shared password
    #[arg(long)]
    pub password: Option<String>,
    /// Override relay idle timeout (seconds)
    #[arg(long)]
    pub relay_idle_timeout_secs: Option<u64>,
    /// Override tunnel connection idle deadline (seconds, 0 = disabled)
    #[arg(long)]
    pub conn_idle_timeout_secs: Option<u64>,
    /// Override dial timeout (seconds)
    #[arg(long)]
    pub dial_timeout_secs: Option<u64>,
    /// Override pooled connection keep-alive (seconds)
    #[arg(long)]
    pub pool_keep_alive_secs: Option<u64>,
    /// Override relay chunk size (bytes)
    #[arg(long)]
    pub relay_chunk_size: Option<usize>,
    /// Override maximum handshake destination length
    #[arg(long)]
    pub max_destination_len: Option<usize>,
    /// Override maximum HTTP request head bytes
    #[arg(long)]
    pub max_header_bytes: Option<usize>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Override log format (pretty/compact/json)
    #[arg(long)]
    pub log_format: Option<String>,
    /// Override TCP_NODELAY (true/false)
    #[arg(long)]
    pub tcp_no_delay: Option<bool>,
    /// TCP Keep-Alive interval in seconds (0 = disabled)
    #[arg(long)]
    pub tcp_keepalive_secs: Option<u64>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.server {
        config.server = v.clone();
    }
    if let Some(v) = &overrides.local {
        config.local = Some(v.clone());
    }
    if let Some(v) = &overrides.password {
        config.password = v.clone();
    }
    let tunnel = &mut config.tunnel;
    if let Some(v) = overrides.relay_idle_timeout_secs {
        tunnel.relay_idle_timeout_secs = v;
    }
    if let Some(v) = overrides.conn_idle_timeout_secs {
        tunnel.conn_idle_timeout_secs = v;
    }
    if let Some(v) = overrides.dial_timeout_secs {
        tunnel.dial_timeout_secs = v;
    }
    if let Some(v) = overrides.pool_keep_alive_secs {
        tunnel.pool_keep_alive_secs = v;
    }
    if let Some(v) = overrides.relay_chunk_size {
        tunnel.relay_chunk_size = v;
    }
    if let Some(v) = overrides.max_destination_len {
        tunnel.max_destination_len = v;
    }
    if let Some(v) = overrides.max_header_bytes {
        tunnel.max_header_bytes = v;
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
    if let Some(v) = &overrides.log_format {
        config.logging.format = Some(v.clone());
    }
    // TCP socket options
    if let Some(v) = overrides.tcp_no_delay {
        config.tcp.no_delay = v;
    }
    if let Some(v) = overrides.tcp_keepalive_secs {
        config.tcp.keepalive_secs = v;
    }
}
