//! TCP socket helpers shared by the tunnel listener, the tunnel dialer and the
//! server's destination pool.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use tokio::net::{TcpListener, TcpStream};

/// Socket options applied to every tunnel and destination connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpOptions {
    /// Disable Nagle's algorithm.
    pub no_delay: bool,
    /// TCP keep-alive idle time; `None` leaves the OS default.
    pub keepalive: Option<Duration>,
}

impl TcpOptions {
    /// Build options from config-style values where `keepalive_secs == 0`
    /// disables keep-alive.
    pub fn new(no_delay: bool, keepalive_secs: u64) -> Self {
        Self {
            no_delay,
            keepalive: (keepalive_secs > 0).then(|| Duration::from_secs(keepalive_secs)),
        }
    }
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            no_delay: true,
            keepalive: None,
        }
    }
}

/// Apply TCP socket options.
pub fn apply_tcp_options(stream: &TcpStream, options: &TcpOptions) -> io::Result<()> {
    stream.set_nodelay(options.no_delay)?;

    if let Some(time) = options.keepalive {
        let sock = socket2::SockRef::from(stream);
        sock.set_tcp_keepalive(&TcpKeepalive::new().with_time(time))?;
    }

    Ok(())
}

/// Create a TCP listener with custom backlog.
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as u32) as i32)?;
    TcpListener::from_std(std::net::TcpListener::from(socket))
}
