//! HTTP proxy request parsing and rewriting.
//!
//! Two request shapes are accepted:
//!
//! - `CONNECT host:port`: the client wants a raw tunnel.
//! - A plain request with an absolute-form target
//!   (`GET http://host/path HTTP/1.1`), or origin-form plus `Host`. It is
//!   rewritten to origin-form with hop-by-hop headers removed and forwarded
//!   over the tunnel as-is.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum number of headers accepted in a request head.
const MAX_HEADERS: usize = 64;

/// Reply sent once a `CONNECT` tunnel is up.
pub const RESPONSE_CONNECT_OK: &[u8] = b"HTTP/1.0 200 Connection Established\r\n\r\n";
/// Reply for a request head that could not be parsed.
pub const RESPONSE_BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
/// Reply when the tunnel could not be opened.
pub const RESPONSE_BAD_GATEWAY: &[u8] =
    b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Headers that describe a single hop and must not be forwarded.
///
/// `Transfer-Encoding` is kept: the body is relayed verbatim along with its
/// framing.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),
    #[error("request head exceeds {0} bytes")]
    TooLarge(usize),
    #[error("client closed before sending a full request head")]
    Incomplete,
    #[error("request target {0:?} has no usable host")]
    MissingHost(String),
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// What the proxy has to do with a parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Reply 200 and relay raw bytes.
    Connect,
    /// Send `head` (the rewritten request head) and relay.
    Forward { head: BytesMut },
}

/// A parsed proxy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: String,
    /// Destination `host[:port]` to put in the tunnel handshake.
    pub destination: String,
    pub kind: RequestKind,
}

/// Parse a request head from `buf`. Returns `Ok(None)` while incomplete,
/// otherwise the request and the length of the head.
pub fn parse_request(buf: &[u8]) -> Result<Option<(ProxyRequest, usize)>, HttpError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    let head_len = match req.parse(buf)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let method = req.method.unwrap_or_default().to_string();
    let target = req.path.unwrap_or_default();

    if method.eq_ignore_ascii_case("CONNECT") {
        if target.is_empty() || target.starts_with('/') {
            return Err(HttpError::MissingHost(target.to_string()));
        }
        let request = ProxyRequest {
            method,
            destination: target.to_string(),
            kind: RequestKind::Connect,
        };
        return Ok(Some((request, head_len)));
    }

    let host_header = req
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("host"))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .map(str::trim);

    let (authority, path) = split_target(target, host_header)?;
    let head = rewrite_head(&method, &path, req.version.unwrap_or(1), &authority, req.headers);
    let request = ProxyRequest {
        method,
        destination: authority,
        kind: RequestKind::Forward { head },
    };
    Ok(Some((request, head_len)))
}

/// Split a request target into `(authority, origin-form path)`.
fn split_target(target: &str, host_header: Option<&str>) -> Result<(String, String), HttpError> {
    if target.starts_with('/') {
        return match host_header {
            Some(host) if !host.is_empty() => Ok((host.to_string(), target.to_string())),
            _ => Err(HttpError::MissingHost(target.to_string())),
        };
    }

    let Some((scheme, rest)) = target.split_once("://") else {
        return Err(HttpError::MissingHost(target.to_string()));
    };
    if !scheme.eq_ignore_ascii_case("http") {
        return Err(HttpError::UnsupportedScheme(scheme.to_string()));
    }

    let (authority, path) = match rest.find(['/', '?']) {
        Some(idx) if rest.as_bytes()[idx] == b'/' => (&rest[..idx], rest[idx..].to_string()),
        // `http://host?q` has an empty path; the origin form needs the slash.
        Some(idx) => (&rest[..idx], format!("/{}", &rest[idx..])),
        None => (rest, "/".to_string()),
    };
    // Drop userinfo.
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if authority.is_empty() {
        return Err(HttpError::MissingHost(target.to_string()));
    }
    Ok((authority.to_string(), path))
}

/// Build the forwarded request head: origin-form target, hop-by-hop headers
/// removed, `Host` guaranteed and `Connection: close` appended.
fn rewrite_head(
    method: &str,
    path: &str,
    version: u8,
    authority: &str,
    headers: &[httparse::Header<'_>],
) -> BytesMut {
    // Headers named in `Connection` are hop-by-hop too.
    let listed: Vec<String> = headers
        .iter()
        .filter(|h| h.name.eq_ignore_ascii_case("connection"))
        .filter_map(|h| std::str::from_utf8(h.value).ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut head = BytesMut::with_capacity(256);
    head.put_slice(method.as_bytes());
    head.put_u8(b' ');
    head.put_slice(path.as_bytes());
    head.put_slice(format!(" HTTP/1.{version}\r\n").as_bytes());

    let mut has_host = false;
    for header in headers {
        let name = header.name.to_ascii_lowercase();
        if HOP_BY_HOP.contains(&name.as_str()) || listed.contains(&name) {
            continue;
        }
        has_host |= name == "host";
        head.put_slice(header.name.as_bytes());
        head.put_slice(b": ");
        head.put_slice(header.value);
        head.put_slice(b"\r\n");
    }
    if !has_host {
        head.put_slice(b"Host: ");
        head.put_slice(authority.as_bytes());
        head.put_slice(b"\r\n");
    }
    head.put_slice(b"Connection: close\r\n\r\n");
    head
}

/// Read from `stream` until a full request head is buffered.
///
/// Returns the request and any bytes received past the head (the start of a
/// body or of tunneled data), which belong to the destination.
pub async fn read_request<S>(
    stream: &mut S,
    max_header_bytes: usize,
) -> Result<(ProxyRequest, BytesMut), HttpError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);
    loop {
        if let Some((request, head_len)) = parse_request(&buf)? {
            let rest = buf.split_off(head_len);
            return Ok((request, rest));
        }
        if buf.len() >= max_header_bytes {
            return Err(HttpError::TooLarge(max_header_bytes));
        }
        buf.reserve(1024);
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(HttpError::Incomplete);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> (ProxyRequest, usize) {
        parse_request(raw.as_bytes()).unwrap().unwrap()
    }

    fn forwarded_head(req: &ProxyRequest) -> String {
        match &req.kind {
            RequestKind::Forward { head } => String::from_utf8(head.to_vec()).unwrap(),
            RequestKind::Connect => panic!("expected a forwarded request"),
        }
    }

    #[test]
    fn connect_request() {
        let raw = "CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n";
        let (req, len) = parse(raw);
        assert_eq!(req.method, "CONNECT");
        assert_eq!(req.destination, "example.com:443");
        assert_eq!(req.kind, RequestKind::Connect);
        assert_eq!(len, raw.len());
    }

    #[test]
    fn partial_head_needs_more() {
        assert!(
            parse_request(b"GET http://a.com/ HTTP/1.1\r\nHost: a")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn absolute_form_is_rewritten() {
        let raw = "GET http://a.com:8080/x?y=1 HTTP/1.1\r\n\
                   Host: a.com:8080\r\n\
                   Proxy-Connection: keep-alive\r\n\
                   Proxy-Authorization: Basic Zm9vOmJhcg==\r\n\
                   Accept: */*\r\n\r\n";
        let (req, _) = parse(raw);
        assert_eq!(req.destination, "a.com:8080");
        assert_eq!(
            forwarded_head(&req),
            "GET /x?y=1 HTTP/1.1\r\nHost: a.com:8080\r\nAccept: */*\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn missing_host_header_is_added() {
        let (req, _) = parse("GET http://a.com HTTP/1.0\r\n\r\n");
        assert_eq!(req.destination, "a.com");
        assert_eq!(
            forwarded_head(&req),
            "GET / HTTP/1.0\r\nHost: a.com\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn connection_listed_headers_are_dropped() {
        let raw = "GET http://a.com/ HTTP/1.1\r\n\
                   Connection: keep-alive, X-Trace\r\n\
                   X-Trace: 1\r\n\
                   Keep-Alive: timeout=5\r\n\
                   TE: trailers\r\n\
                   Transfer-Encoding: chunked\r\n\
                   Upgrade: websocket\r\n\r\n";
        let (req, _) = parse(raw);
        let head = forwarded_head(&req);
        assert!(!head.contains("X-Trace"));
        assert!(!head.contains("Keep-Alive"));
        assert!(!head.contains("TE:"));
        assert!(!head.contains("Upgrade"));
        assert!(head.contains("Transfer-Encoding: chunked\r\n"));
        assert!(head.ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn origin_form_uses_host_header() {
        let (req, _) = parse("GET /index.html HTTP/1.1\r\nHost: b.org\r\n\r\n");
        assert_eq!(req.destination, "b.org");
        assert!(forwarded_head(&req).starts_with("GET /index.html HTTP/1.1\r\n"));
    }

    #[test]
    fn query_without_path() {
        let (req, _) = parse("GET http://a.com?q=1 HTTP/1.1\r\n\r\n");
        assert_eq!(req.destination, "a.com");
        assert!(forwarded_head(&req).starts_with("GET /?q=1 HTTP/1.1\r\n"));
    }

    #[test]
    fn userinfo_is_stripped() {
        let (req, _) = parse("GET http://user:pw@a.com/ HTTP/1.1\r\n\r\n");
        assert_eq!(req.destination, "a.com");
    }

    #[test]
    fn rejects_bad_targets() {
        assert!(matches!(
            parse_request(b"GET https://a.com/ HTTP/1.1\r\n\r\n"),
            Err(HttpError::UnsupportedScheme(s)) if s == "https"
        ));
        assert!(matches!(
            parse_request(b"GET /x HTTP/1.1\r\n\r\n"),
            Err(HttpError::MissingHost(_))
        ));
        assert!(matches!(
            parse_request(b"CONNECT / HTTP/1.1\r\n\r\n"),
            Err(HttpError::MissingHost(_))
        ));
        assert!(matches!(
            parse_request(b"\x01\x02 garbage\r\n\r\n"),
            Err(HttpError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn read_request_keeps_trailing_bytes() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        tokio::io::AsyncWriteExt::write_all(
            &mut client,
            b"CONNECT a.com:443 HTTP/1.1\r\n\r\n\x16\x03\x01",
        )
        .await
        .unwrap();

        let (req, rest) = read_request(&mut server, 8192).await.unwrap();
        assert_eq!(req.destination, "a.com:443");
        assert_eq!(&rest[..], b"\x16\x03\x01");
    }

    #[tokio::test]
    async fn read_request_limits_head_size() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let mut raw = b"GET http://a.com/ HTTP/1.1\r\n".to_vec();
        raw.extend(std::iter::repeat_n(b'a', 600));
        tokio::io::AsyncWriteExt::write_all(&mut client, &raw)
            .await
            .unwrap();

        let err = read_request(&mut server, 256).await.unwrap_err();
        assert!(matches!(err, HttpError::TooLarge(256)));
    }

    #[tokio::test]
    async fn read_request_eof() {
        let (mut client, mut server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut client, b"GET http://a")
            .await
            .unwrap();
        drop(client);
        let err = read_request(&mut server, 8192).await.unwrap_err();
        assert!(matches!(err, HttpError::Incomplete));
    }
}
