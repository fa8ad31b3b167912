//! A tiny canned HTTP/1.1 server for exercising the real client.
//!
//! Each route answers with a fixed status, content type and body. Every
//! request received is recorded so tests can assert on what was sent.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lmstudio_connect::ConnectSettings;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Byte offsets into `body` where the write is paused, so the client
    /// receives the body in separate reads.
    pub split_at: Vec<usize>,
}

impl CannedResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
            split_at: Vec::new(),
        }
    }

    pub fn event_stream(events: &[serde_json::Value]) -> Self {
        let mut body = String::new();
        for event in events {
            body.push_str(&format!("data: {event}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");
        Self {
            status: 200,
            content_type: "text/event-stream",
            body,
            split_at: Vec::new(),
        }
    }

    /// Deliver the body in pieces, pausing at each byte offset.
    pub fn split_at(mut self, offsets: &[usize]) -> Self {
        self.split_at = offsets.to_vec();
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub struct CannedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CannedServer {
    /// Start serving `routes`, keyed by `"METHOD /path"`.
    pub async fn start(routes: Vec<(&'static str, CannedResponse)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<HashMap<String, CannedResponse>> = Arc::new(
            routes
                .into_iter()
                .map(|(key, resp)| (key.to_string(), resp))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    handle(socket, &routes, &recorded).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Settings pointing at this server, with the library inside `dir`.
    pub fn settings(&self, dir: &Path) -> ConnectSettings {
        ConnectSettings {
            base_url: self.base_url.clone(),
            library_path: dir.join("model_library.json"),
            ..Default::default()
        }
    }
}

async fn handle(
    mut socket: TcpStream,
    routes: &HashMap<String, CannedResponse>,
    recorded: &Mutex<Vec<RecordedRequest>>,
) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buffer, b"\r\n\r\n") {
            break pos;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buffer.len() < body_start + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
    let body_end = (body_start + content_length).min(buffer.len());
    let body = String::from_utf8_lossy(&buffer[body_start..body_end]).to_string();

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    recorded.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        body,
    });

    let response = routes
        .get(&format!("{method} {path}"))
        .cloned()
        .unwrap_or_else(|| CannedResponse::json(404, serde_json::json!({"error": "no route"})));

    let head = format!(
        "HTTP/1.1 {} Canned\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.content_type,
        response.body.len(),
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }

    let body = response.body.as_bytes();
    let mut start = 0;
    for &offset in response.split_at.iter().chain(std::iter::once(&body.len())) {
        let end = offset.clamp(start, body.len());
        if socket.write_all(&body[start..end]).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        start = end;
        if start < body.len() {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
    let _ = socket.shutdown().await;
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn models_route(ids: &[&str]) -> (&'static str, CannedResponse) {
    let data: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "object": "model", "owned_by": "organization-owner"}))
        .collect();
    (
        "GET /v1/models",
        CannedResponse::json(200, serde_json::json!({"object": "list", "data": data})),
    )
}
