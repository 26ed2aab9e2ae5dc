//! HTTP proxy connection handling.

use std::net::SocketAddr;
use std::sync::Arc;

use garrow_core::io::pipe;
use garrow_transport::TransportConnector;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::connector::ClientState;
use crate::error::ClientError;
use crate::http::{
    HttpError, RESPONSE_BAD_GATEWAY, RESPONSE_BAD_REQUEST, RESPONSE_CONNECT_OK, RequestKind,
    read_request,
};

/// Handle a single proxy client connection.
pub async fn handle_http_conn<S, C>(stream: S, peer: SocketAddr, state: Arc<ClientState<C>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: TransportConnector,
{
    if let Err(e) = handle_http_conn_inner(stream, peer, &state).await {
        debug!(peer = %peer, error_type = e.error_type(), error = %e, "connection error");
    }
}

async fn handle_http_conn_inner<S, C>(
    mut stream: S,
    peer: SocketAddr,
    state: &ClientState<C>,
) -> Result<(), ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: TransportConnector,
{
    let (request, pending) = match read_request(&mut stream, state.max_header_bytes).await {
        Ok(parsed) => parsed,
        // Nothing to answer on a connection that closed early.
        Err(HttpError::Incomplete) => return Ok(()),
        Err(e) => {
            let _ = stream.write_all(RESPONSE_BAD_REQUEST).await;
            return Err(e.into());
        }
    };
    info!(
        peer = %peer,
        method = %request.method,
        destination = %request.destination,
        "proxy request"
    );

    let mut tunnel = match state.open_tunnel(&request.destination).await {
        Ok(tunnel) => tunnel,
        Err(e) => {
            let _ = stream.write_all(RESPONSE_BAD_GATEWAY).await;
            return Err(e);
        }
    };

    match request.kind {
        RequestKind::Connect => {
            stream.write_all(RESPONSE_CONNECT_OK).await?;
            if !pending.is_empty() {
                tunnel.write_all(&pending).await?;
            }
        }
        RequestKind::Forward { mut head } => {
            head.extend_from_slice(&pending);
            tunnel.write_all(&head).await?;
        }
    }
    tunnel.flush().await?;

    let report = pipe(stream, tunnel, state.relay).await;
    debug!(
        peer = %peer,
        destination = %request.destination,
        sent = report.near_to_far,
        received = report.far_to_near,
        end = %report.end,
        "proxy connection finished"
    );
    Ok(())
}
