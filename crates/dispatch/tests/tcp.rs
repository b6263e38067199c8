use http::StatusCode;
use micro_dispatch::config::StaticFilesConfig;
use micro_dispatch::router::{get, post};
use micro_dispatch::{Server, ServerConfig, handler_sync};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn start(max_body_size: usize) -> SocketAddr {
    let config = ServerConfig {
        max_body_size,
        static_files: StaticFilesConfig { enabled: false, ..StaticFilesConfig::default() },
        ..ServerConfig::default()
    };

    let server = Server::builder()
        .config(config)
        .route(
            "/users/:id",
            get(handler_sync(|ctx| {
                let body = format!("user {}", ctx.param("id").unwrap());
                ctx.render_text(StatusCode::OK, &body);
            })),
        )
        .route(
            "/upload",
            post(handler_sync(|ctx| {
                let len = ctx.body().len().to_string();
                ctx.render_text(StatusCode::OK, &len);
            })),
        )
        .route("/boom", get(handler_sync(|_ctx| panic!("no recovery installed"))))
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

async fn exchange(addr: SocketAddr, raw_request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw_request.as_bytes()).await.unwrap();

    let mut raw_response = Vec::new();
    // a connection whose task panicked may be reset instead of closed
    let _ = stream.read_to_end(&mut raw_response).await;
    String::from_utf8_lossy(&raw_response).into_owned()
}

#[tokio::test]
async fn serves_over_tcp() {
    let addr = start(1024).await;

    let response = exchange(addr, "GET /users/42 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("content-type: text/plain; charset=utf-8\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\nuser 42"), "{response}");

    let response = exchange(addr, "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let addr = start(8).await;

    let small = "POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\nConnection: close\r\n\r\nabcd";
    let response = exchange(addr, small).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\n4"), "{response}");

    let large =
        "POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 16\r\nConnection: close\r\n\r\n0123456789abcdef";
    let response = exchange(addr, large).await;
    assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{response}");
}

#[tokio::test]
async fn panic_without_recovery_drops_only_that_connection() {
    let addr = start(1024).await;

    let response = exchange(addr, "GET /boom HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.is_empty(), "{response}");

    let response = exchange(addr, "GET /users/1 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
}
