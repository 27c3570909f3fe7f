//! Shared utilities for integration and load testing.
//!
//! A minimal OpenAI-compatible mock server on raw TCP, so tests control
//! status codes, chunk boundaries, timing and hangs exactly.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use inference_router::registry::ServerConfig;
use inference_router::selection::Target;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the mock does with each request.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Fixed status and body, then close.
    Respond { status: u16, body: String },
    /// `200 text/event-stream`, chunks written with `delay` between them.
    /// With `hold_open` the connection stays open after the last chunk.
    Stream {
        chunks: Vec<String>,
        delay: Duration,
        hold_open: bool,
    },
    /// Read the request and never answer.
    Hang,
}

impl Behavior {
    pub fn status(status: u16) -> Self {
        Behavior::Respond {
            status,
            body: reason(status).to_string(),
        }
    }

    pub fn json(body: &str) -> Self {
        Behavior::Respond {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn stream(chunks: Vec<String>) -> Self {
        Behavior::Stream {
            chunks,
            delay: Duration::from_millis(5),
            hold_open: false,
        }
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// JSON body of the most recent request.
    pub fn last_body(&self) -> Option<serde_json::Value> {
        let requests = self.requests.lock();
        let raw = requests.last()?;
        let (_, body) = raw.split_once("\r\n\r\n")?;
        serde_json::from_str(body).ok()
    }

    pub fn server(&self, id: &str, priority: i32) -> ServerConfig {
        ServerConfig::new(id, self.base_url(), "mock-model")
            .with_priority(priority)
            .with_capabilities(["chat", "completion"])
    }

    pub fn target(&self, id: &str) -> Target {
        Target::from(&self.server(id, 1))
    }
}

/// Start a mock on an ephemeral port.
pub async fn start_mock(behavior: Behavior) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let counter = hits.clone();
    let log = requests.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let behavior = behavior.clone();
            let counter = counter.clone();
            let log = log.clone();
            tokio::spawn(async move {
                handle(socket, behavior, counter, log).await;
            });
        }
    });

    MockServer { addr, hits, requests }
}

/// An address nothing listens on.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn handle(mut socket: TcpStream, behavior: Behavior, hits: Arc<AtomicUsize>, log: Arc<Mutex<Vec<String>>>) {
    let Some(raw) = read_request(&mut socket).await else {
        return;
    };
    log.lock().push(raw);
    hits.fetch_add(1, Ordering::SeqCst);

    match behavior {
        Behavior::Respond { status, body } => {
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason(status),
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Behavior::Stream {
            chunks,
            delay,
            hold_open,
        } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in chunks {
                tokio::time::sleep(delay).await;
                if socket.write_all(chunk.as_bytes()).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
            if hold_open {
                std::future::pending::<()>().await;
            }
            let _ = socket.shutdown().await;
        }
        Behavior::Hang => {
            std::future::pending::<()>().await;
        }
    }
}

/// Read headers and a Content-Length body. `None` if the peer went away.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// One streaming record carrying `content`.
pub fn sse(content: &str) -> String {
    format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{content}\"}}}}]}}\n\n")
}

pub fn sse_done() -> String {
    "data: [DONE]\n\n".to_string()
}

/// Poll `f` until it holds or `timeout` elapses.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, f: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if f() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    f()
}
