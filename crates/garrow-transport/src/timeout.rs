//! Idle deadline enforcement for a single connection.
//!
//! Every successful read or write moves the shared deadline to
//! `now + window`. A read or write still pending at the deadline closes the
//! connection, as does any error other than `Interrupted` or `WouldBlock`.
//! Once closed, every further operation fails with `NotConnected`.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Instant, Sleep};
use tracing::debug;

/// A stream with an idle deadline.
pub struct TimeoutStream<S> {
    inner: Option<S>,
    window: Option<Duration>,
    deadline: Instant,
    read_timer: Option<Pin<Box<Sleep>>>,
    write_timer: Option<Pin<Box<Sleep>>>,
}

impl<S> TimeoutStream<S> {
    /// Wrap `inner` with an idle `window`. A zero window disables the deadline.
    pub fn new(inner: S, window: Duration) -> Self {
        let window = (!window.is_zero()).then_some(window);
        Self {
            inner: Some(inner),
            window,
            deadline: Instant::now() + window.unwrap_or_default(),
            read_timer: None,
            write_timer: None,
        }
    }

    pub fn window(&self) -> Option<Duration> {
        self.window
    }

    /// Whether the connection was closed by a deadline or a fatal error.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn get_ref(&self) -> Option<&S> {
        self.inner.as_ref()
    }

    fn touch(&mut self) {
        if let Some(window) = self.window {
            self.deadline = Instant::now() + window;
        }
    }

    fn close(&mut self) {
        if self.inner.take().is_some() {
            self.read_timer = None;
            self.write_timer = None;
        }
    }

    /// Settle an inner poll result: refresh the deadline on success, close on
    /// fatal errors, and turn an expired pending operation into `TimedOut`.
    fn settle<T>(
        &mut self,
        cx: &mut Context<'_>,
        result: Poll<io::Result<T>>,
        write: bool,
    ) -> Poll<io::Result<T>> {
        match result {
            Poll::Ready(Ok(value)) => {
                self.touch();
                Poll::Ready(Ok(value))
            }
            Poll::Ready(Err(err)) => {
                if !is_transient(&err) {
                    debug!(error = %err, "closing connection after error");
                    self.close();
                }
                Poll::Ready(Err(err))
            }
            Poll::Pending => {
                if self.window.is_none() {
                    return Poll::Pending;
                }
                let deadline = self.deadline;
                let timer = if write {
                    &mut self.write_timer
                } else {
                    &mut self.read_timer
                };
                let sleep =
                    timer.get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
                if sleep.deadline() != deadline {
                    sleep.as_mut().reset(deadline);
                }
                match sleep.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        debug!("connection idle deadline exceeded");
                        self.close();
                        Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "connection idle deadline exceeded",
                        )))
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection closed")
}

impl<S: fmt::Debug> fmt::Debug for TimeoutStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutStream")
            .field("inner", &self.inner)
            .field("window", &self.window)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<S> AsyncRead for TimeoutStream<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(Err(not_connected()));
        };
        let result = Pin::new(inner).poll_read(cx, buf);
        this.settle(cx, result, false)
    }
}

impl<S> AsyncWrite for TimeoutStream<S>
where
    S: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(Err(not_connected()));
        };
        let result = Pin::new(inner).poll_write(cx, buf);
        this.settle(cx, result, true)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(Err(not_connected()));
        };
        let result = Pin::new(inner).poll_flush(cx);
        this.settle(cx, result, true)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}
