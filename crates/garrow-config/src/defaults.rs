//! Default value functions for serde deserialization.
//!
//! These forward to constants defined in `garrow_core::defaults`.

use garrow_core::defaults;

/// Generate default value functions that forward to garrow_core::defaults constants.
macro_rules! default_fns {
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

default_fns! {
    default_relay_idle_timeout_secs => DEFAULT_RELAY_IDLE_TIMEOUT_SECS: u64,
    default_conn_idle_timeout_secs  => DEFAULT_CONN_IDLE_TIMEOUT_SECS: u64,
    default_dial_timeout_secs       => DEFAULT_DIAL_TIMEOUT_SECS: u64,
    default_pool_keep_alive_secs    => DEFAULT_POOL_KEEP_ALIVE_SECS: u64,
    default_relay_chunk_size        => DEFAULT_RELAY_CHUNK_SIZE: usize,
    default_max_destination_len     => DEFAULT_MAX_DESTINATION_LEN: usize,
    default_max_header_bytes        => DEFAULT_MAX_HEADER_BYTES: usize,
    default_connection_backlog      => DEFAULT_CONNECTION_BACKLOG: u32,
    // TCP socket options
    default_tcp_no_delay            => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_keepalive_secs      => DEFAULT_TCP_KEEPALIVE_SECS: u64,
}
