//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Timeout Defaults
// ============================================================================

/// Default relay idle timeout in seconds. A relay with no traffic in either
/// direction for this long is torn down.
pub const DEFAULT_RELAY_IDLE_TIMEOUT_SECS: u64 = 60;
/// Default per-connection idle deadline for tunnel sockets in seconds.
pub const DEFAULT_CONN_IDLE_TIMEOUT_SECS: u64 = 300;
/// Default timeout for dialing a destination or the tunnel server, in seconds.
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 10;
/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Connection Pool Defaults
// ============================================================================

/// Default keep-alive for a released pooled connection, in seconds.
pub const DEFAULT_POOL_KEEP_ALIVE_SECS: u64 = 60;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default relay chunk size. Each read in the relay is at most this many bytes.
pub const DEFAULT_RELAY_CHUNK_SIZE: usize = 1024;
/// Default maximum destination length accepted in a tunnel handshake.
pub const DEFAULT_MAX_DESTINATION_LEN: usize = 4096;
/// Default maximum HTTP request head size accepted by the proxy front-end.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8192;

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY (disable Nagle's algorithm for lower latency).
pub const DEFAULT_TCP_NO_DELAY: bool = true;
/// Default TCP Keep-Alive interval in seconds (0 = disabled).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 300;
/// Default TCP listener backlog.
pub const DEFAULT_CONNECTION_BACKLOG: u32 = 1024;

// ============================================================================
// Address Defaults
// ============================================================================

/// Port appended to destinations that do not carry one.
pub const DEFAULT_DESTINATION_PORT: u16 = 80;
/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "garrow.yaml";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
