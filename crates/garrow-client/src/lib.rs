//! garrow HTTP proxy client.
//!
//! This crate provides a local HTTP proxy (CONNECT and absolute-form requests)
//! that forwards every connection through an encrypted tunnel to a remote
//! garrow server.

pub mod cli;
mod connector;
mod error;
mod handler;
pub mod http;

pub use cli::ClientArgs;
pub use connector::ClientState;
pub use error::ClientError;
pub use handler::handle_http_conn;

use std::sync::Arc;

use garrow_config::Config;
use garrow_transport::{TcpOptions, TransportConnector, apply_tcp_options};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Run the garrow client with the given configuration.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), ClientError> {
    let local = config
        .local
        .clone()
        .ok_or_else(|| ClientError::Config("missing local listen address".to_string()))?;
    let state = Arc::new(ClientState::from_config(&config)?);
    let tcp = TcpOptions::new(config.tcp.no_delay, config.tcp.keepalive_secs);

    let listener = TcpListener::bind(&local).await?;
    info!(listen = %local, remote = %config.server, "garrow client started");

    serve(listener, state, tcp, shutdown).await
}

/// Accept proxy clients on `listener` until `shutdown` is cancelled.
pub async fn serve<C: TransportConnector>(
    listener: TcpListener,
    state: Arc<ClientState<C>>,
    tcp: TcpOptions,
    shutdown: CancellationToken,
) -> Result<(), ClientError> {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        if let Err(e) = apply_tcp_options(&stream, &tcp) {
                            debug!(peer = %peer, error = %e, "failed to apply tcp options");
                        }
                        let state = state.clone();
                        tokio::spawn(async move {
                            handler::handle_http_conn(stream, peer, state).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!("shutting down client");
                break;
            }
        }
    }

    Ok(())
}
