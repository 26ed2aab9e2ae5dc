//! garrow tunnel server library.
//!
//! Accepts encrypted tunnel connections, reads the destination handshake and
//! relays bytes to the destination through a per-destination connection pool.
//! Exposed as a library for integration tests and the unified `garrow` CLI.

pub mod cli;
mod error;
mod handler;
mod pool;
mod server;
mod state;
mod util;

pub use cli::ServerArgs;
pub use error::ServerError;
pub use handler::handle_conn;
pub use pool::{ConnectionPool, ManagedConn, PoolConfig, PoolError};
pub use server::{DEFAULT_SHUTDOWN_TIMEOUT, run, run_with_shutdown, serve};
pub use state::ServerState;
pub use tokio_util::sync::CancellationToken;
