//! Error type constants for logging.
//!
//! These constants provide consistent error classification across all crates.

/// Handshake or HTTP request violated the protocol.
pub const ERROR_PROTOCOL: &str = "protocol";
/// Peer closed before a complete frame (IV or handshake) arrived.
pub const ERROR_FRAMING: &str = "framing";
/// I/O error.
pub const ERROR_IO: &str = "io";
/// DNS/address resolution error.
pub const ERROR_RESOLVE: &str = "resolve";
/// Outbound connection could not be established.
pub const ERROR_DIAL: &str = "dial";
/// Timeout error.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
