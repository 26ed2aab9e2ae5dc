//! Main server loop and connection handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use garrow_config::Config;
use garrow_core::defaults::DEFAULT_SHUTDOWN_TIMEOUT_SECS;
use garrow_transport::{TransportAcceptor, TunnelListener, listen};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::handler::handle_conn;
use crate::state::{ServerState, listen_options};
use crate::util::ConnectionTracker;

/// Default graceful shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS);

/// Run the server with a cancellation token for graceful shutdown.
pub async fn run_with_shutdown(
    config: Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let addr = resolve_listen_addr(&config.server).await?;
    let listener = listen(addr, &config.password, &listen_options(&config))?;
    let state = Arc::new(ServerState::from_config(&config));
    info!(
        address = %listener.local_addr()?,
        relay_idle_timeout_secs = state.relay.idle_timeout.as_secs(),
        pool_keep_alive_secs = state.pool.config().keep_alive.as_secs(),
        "listening"
    );
    serve(listener, state, shutdown).await
}

/// Run the server until an unrecoverable error, without graceful shutdown.
pub async fn run(config: Config) -> Result<(), ServerError> {
    run_with_shutdown(config, CancellationToken::new()).await
}

/// Accept tunnel connections on `listener` until `shutdown` is cancelled,
/// then wait up to [`DEFAULT_SHUTDOWN_TIMEOUT`] for active connections.
pub async fn serve(
    listener: TunnelListener,
    state: Arc<ServerState>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let tracker = ConnectionTracker::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            result = listener.accept_tcp() => {
                let (tcp, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                };
                debug!(peer = %peer, "new connection");

                let acceptor = listener.acceptor().clone();
                let state = state.clone();
                let guard = tracker.track();

                tokio::spawn(async move {
                    let _guard = guard;
                    let start = Instant::now();

                    let result = async {
                        let stream = acceptor.accept(tcp).await?;
                        handle_conn(stream, state, peer).await
                    }
                    .await;

                    let duration_secs = start.elapsed().as_secs_f64();
                    match result {
                        Ok(()) => debug!(peer = %peer, duration_secs, "connection closed"),
                        Err(err) => warn!(
                            peer = %peer,
                            duration_secs,
                            error_type = err.error_type(),
                            error = %err,
                            "connection closed with error"
                        ),
                    }
                });
            }
        }
    }

    // Graceful drain: wait for active connections
    let active = tracker.count();
    if active > 0 {
        info!(active, "waiting for active connections to drain");
        if tracker.wait_for_zero(DEFAULT_SHUTDOWN_TIMEOUT).await {
            info!("all connections drained");
        } else {
            warn!(
                remaining = tracker.count(),
                "shutdown timeout, connections still active"
            );
        }
    }

    info!("server stopped");
    Ok(())
}

async fn resolve_listen_addr(server: &str) -> Result<SocketAddr, ServerError> {
    if let Ok(addr) = server.parse() {
        return Ok(addr);
    }
    tokio::net::lookup_host(server)
        .await
        .map_err(|err| ServerError::Config(format!("invalid listen address {server:?}: {err}")))?
        .next()
        .ok_or_else(|| ServerError::Config(format!("listen address {server:?} has no addresses")))
}
