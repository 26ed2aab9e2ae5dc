//! Stream wrapper that encrypts writes and decrypts reads with a [`Cipher`].
//!
//! Wire layout per direction: `IV (16 bytes) | ciphertext ...`. The IV is
//! read before the first decrypted byte is returned and written together with
//! the first ciphertext.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::cipher::{Cipher, IV_LEN, Iv};
use crate::error::TransportError;

enum DecryptReadState {
    /// Accumulating the peer IV across partial reads.
    WaitIv { iv: Iv, filled: usize },
    Read,
}

enum EncryptWriteState {
    AssemblePacket,
    /// `pos` bytes of the packet are out; `len` plaintext bytes are owed to
    /// the caller once the rest follows.
    Writing { pos: usize, len: usize },
}

/// An encrypted byte stream over `S`.
///
/// A write encrypts the whole buffer into one packet before any of it reaches
/// `S`. If that write returns `Pending`, the packet is already committed: the
/// next write finishes it and reports the original length, whatever buffer it
/// is given.
pub struct EncryptedStream<S> {
    inner: S,
    cipher: Cipher,
    read_state: DecryptReadState,
    write_state: EncryptWriteState,
    write_buf: BytesMut,
}

impl<S> EncryptedStream<S> {
    /// Wrap `inner`. `cipher` must not have any keystream initialized yet.
    pub fn new(inner: S, cipher: Cipher) -> Self {
        Self {
            inner,
            cipher,
            read_state: DecryptReadState::WaitIv {
                iv: [0u8; IV_LEN],
                filled: 0,
            },
            write_state: EncryptWriteState::AssemblePacket,
            write_buf: BytesMut::new(),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }
}

impl<S: fmt::Debug> fmt::Debug for EncryptedStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedStream")
            .field("inner", &self.inner)
            .field("cipher", &self.cipher)
            .finish()
    }
}

impl<S> AsyncRead for EncryptedStream<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match this.read_state {
                DecryptReadState::WaitIv {
                    ref mut iv,
                    ref mut filled,
                } => {
                    while *filled < IV_LEN {
                        let mut iv_buf = ReadBuf::new(&mut iv[*filled..]);
                        ready!(Pin::new(&mut this.inner).poll_read(cx, &mut iv_buf))?;
                        let n = iv_buf.filled().len();
                        if n == 0 {
                            if *filled == 0 {
                                // Closed before sending anything: plain EOF.
                                return Poll::Ready(Ok(()));
                            }
                            return Poll::Ready(Err(TransportError::Framing {
                                received: *filled,
                                expected: IV_LEN,
                            }
                            .into()));
                        }
                        *filled += n;
                    }
                    let iv = *iv;
                    this.cipher.init_decrypt_state(&iv)?;
                    this.read_state = DecryptReadState::Read;
                }
                DecryptReadState::Read => {
                    let before = buf.filled().len();
                    ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
                    this.cipher.decrypt(&mut buf.filled_mut()[before..])?;
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

impl<S> AsyncWrite for EncryptedStream<S>
where
    S: AsyncWrite + Unpin,
{
    /// Encrypts `buf` as a whole and reports it written only once every
    /// ciphertext byte reached the inner stream.
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            match this.write_state {
                EncryptWriteState::AssemblePacket => {
                    if buf.is_empty() {
                        return Poll::Ready(Ok(0));
                    }
                    this.write_buf.clear();
                    if !this.cipher.is_encrypt_ready() {
                        let iv = this.cipher.init_encrypt_state()?;
                        this.write_buf.extend_from_slice(&iv);
                    }
                    let start = this.write_buf.len();
                    this.write_buf.extend_from_slice(buf);
                    this.cipher.encrypt(&mut this.write_buf[start..])?;
                    this.write_state = EncryptWriteState::Writing {
                        pos: 0,
                        len: buf.len(),
                    };
                }
                EncryptWriteState::Writing { ref mut pos, len } => {
                    while *pos < this.write_buf.len() {
                        let n = ready!(
                            Pin::new(&mut this.inner).poll_write(cx, &this.write_buf[*pos..])
                        )?;
                        if n == 0 {
                            return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                        }
                        *pos += n;
                    }
                    this.write_state = EncryptWriteState::AssemblePacket;
                    return Poll::Ready(Ok(len));
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    fn wrap<S>(inner: S, password: &str) -> EncryptedStream<S> {
        EncryptedStream::new(inner, Cipher::new(password).unwrap())
    }

    #[tokio::test]
    async fn encrypted_roundtrip_both_directions() {
        let (a, b) = duplex(256);
        let mut client = wrap(a, "secret");
        let mut server = wrap(b, "secret");

        client.write_all(b"ping over the tunnel").await.unwrap();
        let mut buf = [0u8; 20];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping over the tunnel");

        server.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn iv_is_sent_once() {
        let (a, mut raw) = duplex(256);
        let mut client = wrap(a, "secret");

        client.write_all(b"abc").await.unwrap();
        client.write_all(b"defg").await.unwrap();
        drop(client);

        let mut wire = Vec::new();
        raw.read_to_end(&mut wire).await.unwrap();
        assert_eq!(wire.len(), IV_LEN + 7);

        let mut cipher = Cipher::new("secret").unwrap();
        let iv: Iv = wire[..IV_LEN].try_into().unwrap();
        cipher.init_decrypt_state(&iv).unwrap();
        let mut body = wire[IV_LEN..].to_vec();
        cipher.decrypt(&mut body).unwrap();
        assert_eq!(body, b"abcdefg");
    }

    #[tokio::test]
    async fn iv_accumulates_across_partial_reads() {
        let (a, mut raw) = duplex(256);
        let mut server = wrap(a, "secret");

        let mut peer = Cipher::new("secret").unwrap();
        let iv = peer.init_encrypt_state().unwrap();
        let mut body = *b"hello";
        peer.encrypt(&mut body).unwrap();

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 5];
            server.read_exact(&mut buf).await.unwrap();
            buf
        });

        raw.write_all(&iv[..5]).await.unwrap();
        tokio::task::yield_now().await;
        raw.write_all(&iv[5..]).await.unwrap();
        raw.write_all(&body).await.unwrap();

        assert_eq!(&reader.await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn short_iv_is_framing_error() {
        let (a, mut raw) = duplex(256);
        let mut server = wrap(a, "secret");

        raw.write_all(&[7u8; 10]).await.unwrap();
        drop(raw);

        let mut buf = [0u8; 4];
        let err = server.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(TransportError::is_framing(&err));
    }

    #[tokio::test]
    async fn close_before_iv_is_eof() {
        let (a, raw) = duplex(256);
        let mut server = wrap(a, "secret");
        drop(raw);

        let mut buf = [0u8; 4];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mismatched_password_garbles() {
        let (a, b) = duplex(256);
        let mut client = wrap(a, "one");
        let mut server = wrap(b, "two");

        client.write_all(b"plaintext!").await.unwrap();
        let mut buf = [0u8; 10];
        server.read_exact(&mut buf).await.unwrap();
        assert_ne!(&buf, b"plaintext!");
    }

    #[tokio::test]
    async fn retried_write_reports_committed_length() {
        // Room for the IV only, so the first write stalls mid packet.
        let (a, b) = duplex(IV_LEN);
        let mut client = wrap(a, "pw");
        let mut server = wrap(b, "pw");
        let payload = [0x42u8; 64];

        let first = std::future::poll_fn(|cx| {
            Poll::Ready(Pin::new(&mut client).poll_write(cx, &payload))
        })
        .await;
        assert!(first.is_pending());

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            server.read_exact(&mut buf).await.unwrap();
            buf
        });
        let n = std::future::poll_fn(|cx| Pin::new(&mut client).poll_write(cx, b"other"))
            .await
            .unwrap();
        assert_eq!(n, payload.len());
        assert_eq!(reader.await.unwrap(), payload);
    }

    #[test]
    fn debug_hides_key_material() {
        let stream = wrap(Vec::<u8>::new(), "hunter2");
        let out = format!("{stream:?}");
        assert!(out.starts_with("EncryptedStream"));
        assert!(out.contains("encrypt_ready: false"));
        assert!(!out.contains("hunter2"));
    }
}
