//! Destination connection pool.
//!
//! Connections are grouped by normalized destination. A connection handed out
//! by [`ConnectionPool::get`] is busy until it is released with
//! [`ConnectionPool::put`], which parks it as idle for `keep_alive` before it
//! is closed, or discarded with [`ConnectionPool::remove`] (or by dropping
//! it). A group is forgotten as soon as its last member leaves.
//!
//! Locks are always taken map first, then group.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use garrow_core::defaults::DEFAULT_POOL_KEEP_ALIVE_SECS;
use garrow_proto::normalize_destination;
use garrow_transport::{TcpOptions, apply_tcp_options};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

/// Pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// How long a released connection stays reusable.
    pub keep_alive: Duration,
    /// Socket options for newly dialed destination connections.
    pub tcp: TcpOptions,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(DEFAULT_POOL_KEEP_ALIVE_SECS),
            tcp: TcpOptions::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("resolve {destination}: {source}")]
    Resolve {
        destination: String,
        #[source]
        source: io::Error,
    },
    #[error("dial {destination}: {source}")]
    Dial {
        destination: String,
        #[source]
        source: io::Error,
    },
    #[error("dial {destination}: timed out after {timeout:?}")]
    DialTimeout {
        destination: String,
        timeout: Duration,
    },
}

/// Identity and idle state of one pooled connection.
#[derive(Debug)]
struct Slot {
    id: u64,
    idle: AtomicBool,
    /// Bumped on every release so a stale expiry timer can tell it lost.
    epoch: AtomicU64,
}

struct Member {
    slot: Arc<Slot>,
    peer: SocketAddr,
    /// The stream while the connection sits idle in the pool.
    parked: Option<TcpStream>,
}

type Group = Arc<Mutex<Vec<Member>>>;
type Groups = Arc<Mutex<HashMap<String, Group>>>;

/// Connection pool keyed by destination.
pub struct ConnectionPool {
    groups: Groups,
    config: PoolConfig,
    next_id: AtomicU64,
}

impl ConnectionPool {
    /// Create a pool with the given keep-alive and default socket options.
    pub fn new(keep_alive: Duration) -> Self {
        Self::with_config(PoolConfig {
            keep_alive,
            ..PoolConfig::default()
        })
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            groups: Arc::new(Mutex::new(HashMap::new())),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get a connection to `destination` with no dial timeout.
    pub async fn get(&self, destination: &str) -> Result<ManagedConn, PoolError> {
        self.get_timeout(destination, Duration::ZERO).await
    }

    /// Get a connection to `destination`, reusing an idle one when possible.
    /// A non-zero `timeout` bounds the dial of a new connection.
    pub async fn get_timeout(
        &self,
        destination: &str,
        timeout: Duration,
    ) -> Result<ManagedConn, PoolError> {
        let destination = normalize_destination(destination).into_owned();
        let addr = resolve(&destination).await?;

        let existing = self.groups.lock().get(&destination).cloned();
        let reused = existing.and_then(|group| take_idle(&self.groups, &group, &destination));
        if let Some(conn) = reused {
            debug!(destination = %destination, conn_id = conn.id(), "reusing pooled connection");
            return Ok(conn);
        }

        let stream = dial(&destination, addr, timeout).await?;
        if let Err(err) = apply_tcp_options(&stream, &self.config.tcp) {
            debug!(destination = %destination, error = %err, "failed to apply tcp options");
        }

        let slot = Arc::new(Slot {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            idle: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        });
        // Join under the map lock so a concurrent prune cannot orphan the group.
        let group = {
            let mut groups = self.groups.lock();
            let group = groups.entry(destination.clone()).or_default().clone();
            group.lock().push(Member {
                slot: slot.clone(),
                peer: addr,
                parked: None,
            });
            group
        };
        debug!(destination = %destination, conn_id = slot.id, peer = %addr, "dialed new connection");

        Ok(ManagedConn {
            stream: Some(stream),
            slot,
            group,
            groups: self.groups.clone(),
            destination,
            peer: addr,
        })
    }

    /// Release `conn` for reuse. It is closed if not reused within the
    /// keep-alive window.
    pub fn put(&self, mut conn: ManagedConn) {
        let Some(stream) = conn.stream.take() else {
            return;
        };
        let released = {
            let mut members = conn.group.lock();
            members
                .iter_mut()
                .find(|m| Arc::ptr_eq(&m.slot, &conn.slot))
                .map(|member| {
                    member.parked = Some(stream);
                    let epoch = member.slot.epoch.fetch_add(1, Ordering::AcqRel) + 1;
                    member.slot.idle.store(true, Ordering::Release);
                    epoch
                })
        };
        let Some(epoch) = released else {
            // Membership already gone; the stream was dropped with the closure.
            prune(&conn.groups, &conn.destination, &conn.group);
            return;
        };
        debug!(destination = %conn.destination, conn_id = conn.slot.id, "connection released to pool");

        let groups = conn.groups.clone();
        let group = conn.group.clone();
        let slot = conn.slot.clone();
        let destination = conn.destination.clone();
        let keep_alive = self.config.keep_alive;
        tokio::spawn(async move {
            tokio::time::sleep(keep_alive).await;
            expire(&groups, &destination, &group, &slot, epoch);
        });
    }

    /// Close `conn` and drop it from its group.
    pub fn remove(&self, conn: ManagedConn) {
        debug!(destination = %conn.destination, conn_id = conn.slot.id, "connection removed from pool");
        drop(conn);
    }

    /// Number of connections (busy and idle) for `destination`.
    pub fn group_len(&self, destination: &str) -> usize {
        self.existing_group(destination)
            .map(|group| group.lock().len())
            .unwrap_or(0)
    }

    /// Number of idle connections for `destination`.
    pub fn idle_len(&self, destination: &str) -> usize {
        self.existing_group(destination)
            .map(|group| {
                group
                    .lock()
                    .iter()
                    .filter(|m| m.slot.idle.load(Ordering::Acquire))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Destinations that have a group, sorted.
    pub fn destinations(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.groups.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn existing_group(&self, destination: &str) -> Option<Group> {
        let destination = normalize_destination(destination);
        self.groups.lock().get(destination.as_ref()).cloned()
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::with_config(PoolConfig::default())
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("destinations", &self.groups.lock().len())
            .finish()
    }
}

/// Flip the first idle member to busy and hand out its stream.
fn take_idle(groups: &Groups, group: &Group, destination: &str) -> Option<ManagedConn> {
    let mut members = group.lock();
    for member in members.iter_mut() {
        if !member.slot.idle.load(Ordering::Acquire) {
            continue;
        }
        let Some(stream) = member.parked.take() else {
            continue;
        };
        member.slot.idle.store(false, Ordering::Release);
        return Some(ManagedConn {
            stream: Some(stream),
            slot: member.slot.clone(),
            group: group.clone(),
            groups: groups.clone(),
            destination: destination.to_string(),
            peer: member.peer,
        });
    }
    None
}

/// Keep-alive expiry: drop the member only if it is still idle from the
/// release that scheduled this timer.
fn expire(
    groups: &Mutex<HashMap<String, Group>>,
    destination: &str,
    group: &Group,
    slot: &Arc<Slot>,
    epoch: u64,
) {
    {
        let mut members = group.lock();
        if !slot.idle.load(Ordering::Acquire) || slot.epoch.load(Ordering::Acquire) != epoch {
            return;
        }
        let Some(pos) = members.iter().position(|m| Arc::ptr_eq(&m.slot, slot)) else {
            return;
        };
        members.remove(pos);
    }
    debug!(destination = %destination, conn_id = slot.id, "idle pooled connection expired");
    prune(groups, destination, group);
}

/// Forget `destination` if `group` is still its entry and has no members.
fn prune(groups: &Mutex<HashMap<String, Group>>, destination: &str, group: &Group) {
    let mut groups = groups.lock();
    let empty = groups
        .get(destination)
        .is_some_and(|current| Arc::ptr_eq(current, group) && current.lock().is_empty());
    if empty {
        groups.remove(destination);
    }
}

/// Resolve `destination`, preferring an IPv4 address.
async fn resolve(destination: &str) -> Result<SocketAddr, PoolError> {
    let resolve_err = |source| PoolError::Resolve {
        destination: destination.to_string(),
        source,
    };
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(destination)
        .await
        .map_err(resolve_err)?
        .collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            resolve_err(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses found",
            ))
        })
}

async fn dial(
    destination: &str,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<TcpStream, PoolError> {
    let connect = TcpStream::connect(addr);
    let result = if timeout.is_zero() {
        connect.await
    } else {
        tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| PoolError::DialTimeout {
                destination: destination.to_string(),
                timeout,
            })?
    };
    result.map_err(|source| PoolError::Dial {
        destination: destination.to_string(),
        source,
    })
}

/// A destination connection owned by the pool's bookkeeping.
///
/// Reads and writes go straight to the underlying TCP stream. Dropping it
/// without [`ConnectionPool::put`] closes the connection.
pub struct ManagedConn {
    stream: Option<TcpStream>,
    slot: Arc<Slot>,
    group: Group,
    groups: Groups,
    destination: String,
    peer: SocketAddr,
}

impl ManagedConn {
    /// Normalized destination this connection belongs to.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Pool-unique connection id, stable across reuse.
    pub fn id(&self) -> u64 {
        self.slot.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection released"))
    }
}

impl fmt::Debug for ManagedConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedConn")
            .field("id", &self.slot.id)
            .field("destination", &self.destination)
            .field("peer", &self.peer)
            .finish()
    }
}

impl Drop for ManagedConn {
    fn drop(&mut self) {
        if self.stream.take().is_some() {
            self.group
                .lock()
                .retain(|m| !Arc::ptr_eq(&m.slot, &self.slot));
            prune(&self.groups, &self.destination, &self.group);
        }
    }
}

impl AsyncRead for ManagedConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().stream()?).poll_read(cx, buf)
    }
}

impl AsyncWrite for ManagedConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(self.get_mut().stream()?).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().stream()?).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().stream()?).poll_shutdown(cx)
    }
}
