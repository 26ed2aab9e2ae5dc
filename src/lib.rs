//! # garrow
//!
//! An encrypted TCP tunneling proxy.
//!
//! A local HTTP proxy front-end forwards each connection through an
//! AES-256-CFB encrypted tunnel to a remote server, which relays it to the
//! requested destination over a per-destination connection pool.
//!
//! ## Crates
//!
//! - [`garrow_core`] - Default values, error labels and the idle-timeout relay
//! - [`garrow_proto`] - Destination handshake framing
//! - [`garrow_transport`] - Cipher, encrypted and deadline streams, dial/listen
//! - [`garrow_config`] - Configuration loading, validation and logging setup
//! - [`garrow_server`] - Tunnel server and connection pool
//! - [`garrow_client`] - HTTP proxy front-end

pub use garrow_client as client;
pub use garrow_config as config;
pub use garrow_core as core;
pub use garrow_proto as proto;
pub use garrow_server as server;
pub use garrow_transport as transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use garrow_client::{ClientError, ClientState};
    pub use garrow_config::{Config, Role, load_config, validate_config};
    pub use garrow_server::{
        CancellationToken, ConnectionPool, ServerError, run, run_with_shutdown,
    };
    pub use garrow_transport::{TunnelConnector, TunnelStream, dial, listen};
}
