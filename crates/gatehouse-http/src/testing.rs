//! A scripted local HTTP server for tests.
//!
//! Serves one canned response per request, in order; once the script
//! runs out the last response repeats. Every request is recorded so
//! tests can assert on the headers and body the client sent.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Reply with `status` and `body` as the JSON text.
    Json { status: u16, body: String },
    /// Accept the request and never answer.
    Hang,
}

impl ScriptedResponse {
    /// `200 OK` with `{"data": data}`.
    pub fn data(data: Value) -> Self {
        Self::envelope(serde_json::json!({ "data": data }))
    }

    /// `200 OK` with the given envelope.
    pub fn envelope(envelope: Value) -> Self {
        Self::Json {
            status: 200,
            body: envelope.to_string(),
        }
    }

    /// Any status with a raw body.
    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self::Json {
            status,
            body: body.into(),
        }
    }
}

/// A request as the server saw it. Header names are lowercased.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// First header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The body parsed as JSON.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

struct Shared {
    script: Vec<ScriptedResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// See the module docs. The server stops when dropped.
pub struct ScriptedServer {
    base_url: String,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    /// Binds `127.0.0.1:0` and starts serving `script`.
    ///
    /// # Panics
    /// If the script is empty or the listener cannot bind.
    pub async fn start(script: Vec<ScriptedResponse>) -> Self {
        assert!(!script.is_empty(), "script needs at least one response");
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local listener should bind");
        let addr = listener.local_addr().expect("listener has an address");
        let shared = Arc::new(Shared {
            script,
            requests: Mutex::new(Vec::new()),
        });

        let handle = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let shared = Arc::clone(&shared);
                    tokio::spawn(serve_connection(socket, shared));
                }
            }
        });

        Self {
            base_url: format!("http://{addr}/"),
            shared,
            handle,
        }
    }

    /// `http://127.0.0.1:{port}/`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serves requests on one keep-alive connection until the peer closes.
async fn serve_connection(mut socket: TcpStream, shared: Arc<Shared>) {
    loop {
        let Some(request) = read_request(&mut socket).await else {
            return;
        };
        let index = {
            let mut requests = shared
                .requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            requests.push(request);
            requests.len() - 1
        };
        let response = &shared.script[index.min(shared.script.len() - 1)];

        match response {
            ScriptedResponse::Json { status, body } => {
                let head = format!(
                    "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
                    reason(*status),
                    body.len()
                );
                if socket.write_all(head.as_bytes()).await.is_err()
                    || socket.write_all(body.as_bytes()).await.is_err()
                {
                    return;
                }
            }
            ScriptedResponse::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return;
            }
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_owned();
    let path = request_line.next()?.to_owned();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_owned()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Some(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Status",
    }
}
