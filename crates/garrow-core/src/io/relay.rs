//! Bidirectional relay bounded by a shared idle timeout.
//!
//! Each direction has its own read loop that pushes chunks, or a single
//! end-of-stream marker, onto a bounded channel. One coordinator drains both
//! channels, writes each chunk to the opposite stream and resets an idle
//! timer shared by both directions. The relay ends at the first end marker,
//! write failure or idle expiry. Only an expiry with nothing half written and
//! nothing queued is reported as [`RelayEnd::IdleTimeout`].
//!
//! The read loops run inside the relay future, so none of them outlives the
//! call.

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant as TokioInstant;
use tracing::trace;

use crate::defaults::{DEFAULT_RELAY_CHUNK_SIZE, DEFAULT_RELAY_IDLE_TIMEOUT_SECS};

/// Chunks a read loop may queue ahead of the coordinator.
const CHANNEL_DEPTH: usize = 2;

/// Relay tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    /// Maximum time without data in either direction.
    pub idle_timeout: Duration,
    /// Size of every read; chunks never grow past this.
    pub chunk_size: usize,
}

impl RelayOptions {
    pub fn new(idle_timeout: Duration, chunk_size: usize) -> Self {
        Self {
            idle_timeout,
            chunk_size,
        }
    }
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(DEFAULT_RELAY_IDLE_TIMEOUT_SECS),
            chunk_size: DEFAULT_RELAY_CHUNK_SIZE,
        }
    }
}

/// One of the two streams handed to [`relay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Near,
    Far,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Near => f.write_str("near"),
            Side::Far => f.write_str("far"),
        }
    }
}

/// Why a relay stopped.
#[derive(Debug)]
pub enum RelayEnd {
    /// Nothing moved in either direction for the whole window.
    IdleTimeout(Duration),
    /// `side` reached end of stream (`cause` is `None`) or failed.
    Closed {
        side: Side,
        cause: Option<io::Error>,
    },
}

impl RelayEnd {
    pub fn is_idle_timeout(&self) -> bool {
        matches!(self, RelayEnd::IdleTimeout(_))
    }
}

impl fmt::Display for RelayEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayEnd::IdleTimeout(window) => write!(f, "idle for {}s", window.as_secs()),
            RelayEnd::Closed { side, cause: None } => write!(f, "{side} side closed"),
            RelayEnd::Closed {
                side,
                cause: Some(err),
            } => write!(f, "{side} side failed: {err}"),
        }
    }
}

/// Outcome of a finished relay.
#[derive(Debug)]
pub struct RelayReport {
    pub end: RelayEnd,
    /// Bytes read from the near stream and delivered to the far stream.
    pub near_to_far: u64,
    /// Bytes read from the far stream and delivered to the near stream.
    pub far_to_near: u64,
}

enum Chunk {
    Data(Bytes),
    End(Option<io::Error>),
}

/// Shuttle bytes between `near` and `far` until one side closes or the idle
/// timeout fires.
///
/// Both streams are borrowed; the caller decides what happens to them
/// afterwards. Use [`pipe`] to close both once the relay is over.
pub async fn relay<A, B>(near: &mut A, far: &mut B, options: RelayOptions) -> RelayReport
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let chunk_size = options.chunk_size.max(1);
    let (near_r, mut near_w) = tokio::io::split(near);
    let (far_r, mut far_w) = tokio::io::split(far);
    let (near_tx, near_rx) = mpsc::channel(CHANNEL_DEPTH);
    let (far_tx, far_rx) = mpsc::channel(CHANNEL_DEPTH);

    // Finished read loops park here so only the coordinator decides the end.
    let readers = async {
        tokio::join!(
            read_loop(near_r, near_tx, chunk_size),
            read_loop(far_r, far_tx, chunk_size),
        );
        std::future::pending::<Infallible>().await
    };

    tokio::select! {
        report = coordinate(near_rx, far_rx, &mut near_w, &mut far_w, options.idle_timeout) => report,
        never = readers => match never {},
    }
}

/// Owned variant of [`relay`]: shuts down and drops both streams when the
/// relay ends.
pub async fn pipe<A, B>(mut near: A, mut far: B, options: RelayOptions) -> RelayReport
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let report = relay(&mut near, &mut far, options).await;
    let _ = near.shutdown().await;
    let _ = far.shutdown().await;
    report
}

async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<Chunk>, chunk_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    loop {
        let chunk = match reader.read(&mut buf).await {
            Ok(0) => Chunk::End(None),
            Ok(n) => Chunk::Data(Bytes::copy_from_slice(&buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Chunk::End(Some(e)),
        };
        let last = matches!(chunk, Chunk::End(_));
        if tx.send(chunk).await.is_err() || last {
            return;
        }
    }
}

async fn coordinate<N, F>(
    mut near_rx: mpsc::Receiver<Chunk>,
    mut far_rx: mpsc::Receiver<Chunk>,
    near_w: &mut N,
    far_w: &mut F,
    idle_timeout: Duration,
) -> RelayReport
where
    N: AsyncWrite + Unpin,
    F: AsyncWrite + Unpin,
{
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    let mut near_to_far = 0u64;
    let mut far_to_near = 0u64;

    let end = loop {
        let (data, to) = tokio::select! {
            chunk = near_rx.recv() => match chunk {
                Some(Chunk::Data(data)) => (data, Side::Far),
                Some(Chunk::End(cause)) => break RelayEnd::Closed { side: Side::Near, cause },
                None => break RelayEnd::Closed { side: Side::Near, cause: None },
            },
            chunk = far_rx.recv() => match chunk {
                Some(Chunk::Data(data)) => (data, Side::Near),
                Some(Chunk::End(cause)) => break RelayEnd::Closed { side: Side::Far, cause },
                None => break RelayEnd::Closed { side: Side::Far, cause: None },
            },
            () = &mut idle => break idle_end(&mut near_rx, &mut far_rx, idle_timeout),
        };

        // A write still stuck at the idle deadline leaves `to` half written.
        let deadline = idle.deadline();
        let written = match to {
            Side::Far => tokio::time::timeout_at(deadline, write_chunk(far_w, &data)).await,
            Side::Near => tokio::time::timeout_at(deadline, write_chunk(near_w, &data)).await,
        };
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                break RelayEnd::Closed {
                    side: to,
                    cause: Some(e),
                };
            }
            Err(_) => {
                break RelayEnd::Closed {
                    side: to,
                    cause: Some(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "write stalled past idle deadline",
                    )),
                };
            }
        }

        match to {
            Side::Far => near_to_far += data.len() as u64,
            Side::Near => far_to_near += data.len() as u64,
        }
        idle.as_mut().reset(TokioInstant::now() + idle_timeout);
    };

    trace!(end = %end, near_to_far, far_to_near, "relay finished");
    RelayReport {
        end,
        near_to_far,
        far_to_near,
    }
}

/// Idle expiry only counts as a clean stop when neither read loop has queued
/// anything the coordinator has not delivered yet.
fn idle_end(
    near_rx: &mut mpsc::Receiver<Chunk>,
    far_rx: &mut mpsc::Receiver<Chunk>,
    idle_timeout: Duration,
) -> RelayEnd {
    for (rx, side) in [(far_rx, Side::Far), (near_rx, Side::Near)] {
        match rx.try_recv() {
            Ok(Chunk::Data(_)) => {
                return RelayEnd::Closed {
                    side,
                    cause: Some(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "undelivered data at idle deadline",
                    )),
                };
            }
            Ok(Chunk::End(cause)) => return RelayEnd::Closed { side, cause },
            Err(_) => {}
        }
    }
    RelayEnd::IdleTimeout(idle_timeout)
}

async fn write_chunk<W>(writer: &mut W, data: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(data).await?;
    writer.flush().await
}
