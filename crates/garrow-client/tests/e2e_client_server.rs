//! End-to-end tests: HTTP client -> garrow-client -> tunnel -> garrow-server -> destination.
#![allow(clippy::tests_outside_test_module)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use garrow_client::ClientState;
use garrow_config::{Config, ConfigFormat};
use garrow_server::{CancellationToken, ServerState};
use garrow_transport::{ListenOptions, TcpOptions, listen};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const PASSWORD: &str = "e2e-secret";

struct Stack {
    proxy: SocketAddr,
    server_state: Arc<ServerState>,
    shutdown: CancellationToken,
}

impl Stack {
    async fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .try_init();

        let listener = listen(
            "127.0.0.1:0".parse().unwrap(),
            PASSWORD,
            &ListenOptions::default(),
        )
        .unwrap();
        let server_addr = listener.local_addr().unwrap();

        let config: Config = ConfigFormat::Yaml
            .parse(&format!(
                "server: \"{server_addr}\"\nlocal: \"127.0.0.1:0\"\npassword: {PASSWORD}\n"
            ))
            .unwrap();
        let server_state = Arc::new(ServerState::from_config(&config));
        let shutdown = CancellationToken::new();
        tokio::spawn(garrow_server::serve(
            listener,
            server_state.clone(),
            shutdown.clone(),
        ));

        let client_state = Arc::new(ClientState::from_config(&config).unwrap());
        let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy = proxy_listener.local_addr().unwrap();
        tokio::spawn(garrow_client::serve(
            proxy_listener,
            client_state,
            TcpOptions::default(),
            shutdown.clone(),
        ));

        Self {
            proxy,
            server_state,
            shutdown,
        }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });
    addr
}

/// Minimal origin server: answers one request per connection with the
/// request line it saw, then closes.
async fn start_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf);
                let line = head.lines().next().unwrap_or_default().to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{line}",
                    line.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });
    addr
}

async fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        assert_ne!(n, 0, "connection closed before response head");
        buf.push(byte[0]);
    }
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn test_connect_through_tunnel() {
    let echo = start_echo().await;
    let stack = Stack::start().await;

    let mut client = TcpStream::connect(stack.proxy).await.unwrap();
    client
        .write_all(format!("CONNECT {echo} HTTP/1.1\r\nHost: {echo}\r\n\r\n").as_bytes())
        .await
        .unwrap();
    let head = read_head(&mut client).await;
    assert!(head.starts_with("HTTP/1.0 200"), "unexpected head: {head}");

    client.write_all(b"tunneled bytes").await.unwrap();
    let mut buf = [0u8; 14];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"tunneled bytes");
    assert_eq!(stack.server_state.pool.group_len(&echo.to_string()), 1);
}

#[tokio::test]
async fn test_plain_get_through_tunnel() {
    let origin = start_origin().await;
    let stack = Stack::start().await;

    let mut client = TcpStream::connect(stack.proxy).await.unwrap();
    client
        .write_all(format!("GET http://{origin}/hello?x=1 HTTP/1.1\r\n\r\n").as_bytes())
        .await
        .unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    let response = String::from_utf8(response).unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK"), "unexpected response: {response}");
    assert!(response.ends_with("GET /hello?x=1 HTTP/1.1"));
}

#[tokio::test]
async fn test_unreachable_server_gets_bad_gateway() {
    // Reserve a port, then free it so nothing is listening there.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let config: Config = ConfigFormat::Yaml
        .parse(&format!(
            "server: \"{dead}\"\nlocal: \"127.0.0.1:0\"\npassword: {PASSWORD}\n"
        ))
        .unwrap();
    let state = Arc::new(ClientState::from_config(&config).unwrap());
    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy = proxy_listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(garrow_client::serve(
        proxy_listener,
        state,
        TcpOptions::default(),
        shutdown.clone(),
    ));

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client
        .write_all(b"CONNECT example.invalid:443 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let head = tokio::time::timeout(Duration::from_secs(10), read_head(&mut client))
        .await
        .unwrap();
    assert!(head.starts_with("HTTP/1.1 502"), "unexpected head: {head}");
    shutdown.cancel();
}
