//! Per-connection tunnel handling.

use std::net::SocketAddr;
use std::sync::Arc;

use garrow_core::io::{RelayEnd, relay};
use garrow_proto::read_handshake;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

use crate::error::ServerError;
use crate::state::ServerState;

/// Serve one tunnel connection: read the handshake, take a destination
/// connection from the pool and relay until either side closes or the relay
/// goes idle.
///
/// An idle destination connection goes back to the pool; one that closed or
/// failed is discarded. The tunnel connection is always closed.
#[instrument(level = "debug", skip(stream, state), fields(peer = %peer))]
pub async fn handle_conn<S>(
    mut stream: S,
    state: Arc<ServerState>,
    peer: SocketAddr,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handshake = match read_handshake(&mut stream, state.max_destination_len).await {
        Ok(handshake) => handshake,
        Err(err) => {
            let _ = stream.shutdown().await;
            return Err(err.into());
        }
    };
    let destination = handshake.destination;
    debug!(destination = %destination, "handshake received");

    let mut conn = match state
        .pool
        .get_timeout(&destination, state.dial_timeout)
        .await
    {
        Ok(conn) => conn,
        Err(err) => {
            let _ = stream.shutdown().await;
            return Err(err.into());
        }
    };
    debug!(destination = %destination, conn_id = conn.id(), "destination ready");

    let report = relay(&mut stream, &mut conn, state.relay).await;
    let _ = stream.shutdown().await;
    debug!(
        destination = %destination,
        conn_id = conn.id(),
        sent = report.near_to_far,
        received = report.far_to_near,
        end = %report.end,
        "relay finished"
    );

    match report.end {
        RelayEnd::IdleTimeout(_) => state.pool.put(conn),
        RelayEnd::Closed { .. } => state.pool.remove(conn),
    }
    Ok(())
}
