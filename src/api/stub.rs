//! In-process HTTP stub of the test drive API for tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// A request as seen by the stub
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    /// Request target including the query string
    pub path: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }
}

/// What the stub does with a request
pub(crate) enum StubReply {
    Respond { status: u16, body: String },
    /// Accept the request and never answer
    Hang,
}

impl StubReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        StubReply::Respond {
            status,
            body: body.to_string(),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        StubReply::Respond {
            status,
            body: body.to_string(),
        }
    }
}

type Handler = Arc<dyn Fn(&RecordedRequest) -> StubReply + Send + Sync>;

pub(crate) struct StubServer {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<RecordedRequest>,
}

impl StubServer {
    /// Bind to an ephemeral port and serve until the runtime shuts down
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> StubReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        let addr = listener.local_addr().expect("no local addr");
        let (tx, requests) = mpsc::unbounded_channel();
        let handler: Handler = Arc::new(handler);

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let handler = handler.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    serve_one(socket, handler, tx).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the next recorded request
    pub async fn next_request(&mut self) -> RecordedRequest {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("no request within 5s")
            .expect("stub server stopped")
    }

    /// Everything recorded so far
    pub fn drain(&mut self) -> Vec<RecordedRequest> {
        let mut out = Vec::new();
        while let Ok(request) = self.requests.try_recv() {
            out.push(request);
        }
        out
    }
}

async fn serve_one(
    mut socket: TcpStream,
    handler: Handler,
    tx: mpsc::UnboundedSender<RecordedRequest>,
) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let reply = handler(&request);
    let _ = tx.send(request);

    match reply {
        StubReply::Respond { status, body } => {
            let response = format!(
                "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        StubReply::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = head_end + 4;
    while data.len() < body_start + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        path,
        body: data[body_start..body_start + content_length].to_vec(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
