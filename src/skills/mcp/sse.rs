//! SSE 传输：远程 MCP 服务器
//!
//! GET endpoint 建立事件流，等待 `endpoint` 事件给出 POST 地址；之后请求以 JSON-RPC POST 发出，
//! 响应通过事件流中的 `message` 事件到达，按 id 路由给等待者。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::core::TransportError;
use crate::skills::mcp::protocol::{IncomingMessage, JsonRpcNotification, JsonRpcRequest, McpTransport};

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, TransportError>>>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// 增量 SSE 解析器：喂入任意切分的字节块，吐出完整事件
///
/// 只在遇到完整的 `\n\n` 事件块后才做 UTF-8 解码，多字节字符被切在两块之间时不会损坏。
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // CR 只会以单字节 ASCII 出现，直接丢弃即可统一 CRLF
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            let block = String::from_utf8_lossy(&raw);
            let mut event = String::from("message");
            let mut data: Vec<&str> = Vec::new();
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = v.trim().to_string();
                } else if let Some(v) = line.strip_prefix("data:") {
                    data.push(v.strip_prefix(' ').unwrap_or(v));
                }
            }
            if !data.is_empty() {
                events.push(SseEvent {
                    event,
                    data: data.join("\n"),
                });
            }
        }
        events
    }
}

pub struct SseTransport {
    client: reqwest::Client,
    post_url: String,
    pending: PendingMap,
    next_id: AtomicI64,
    alive: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl SseTransport {
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base = reqwest::Url::parse(endpoint)
            .map_err(|e| TransportError::Protocol(format!("invalid endpoint {}: {}", endpoint, e)))?;
        let client = reqwest::Client::new();
        let response = client
            .get(base.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Io(format!("SSE connect failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(TransportError::Io(format!(
                "SSE connect failed: HTTP {}",
                response.status()
            )));
        }

        let alive = Arc::new(AtomicBool::new(true));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();

        let pending_reader = Arc::clone(&pending);
        let alive_reader = Arc::clone(&alive);
        let mut stream = response.bytes_stream();
        let reader = tokio::spawn(async move {
            let mut parser = SseParser::default();
            let mut endpoint_tx = Some(endpoint_tx);
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(error = %e, "mcp sse stream failed");
                        break;
                    }
                };
                for event in parser.push(&chunk) {
                    match event.event.as_str() {
                        "endpoint" => {
                            if let Some(tx) = endpoint_tx.take() {
                                let _ = tx.send(event.data.trim().to_string());
                            }
                        }
                        "message" => match serde_json::from_str::<IncomingMessage>(&event.data) {
                            Ok(msg) => {
                                if let Some((id, result)) = msg.into_response() {
                                    let tx = pending_reader.lock().ok().and_then(|mut p| p.remove(&id));
                                    if let Some(tx) = tx {
                                        let _ = tx.send(result);
                                    }
                                }
                            }
                            Err(e) => tracing::debug!(error = %e, "unparseable mcp sse message"),
                        },
                        other => tracing::debug!(event = other, "ignored sse event"),
                    }
                }
            }
            alive_reader.store(false, Ordering::SeqCst);
            if let Ok(mut p) = pending_reader.lock() {
                p.clear();
            }
        });

        let post_path = match tokio::time::timeout(timeout, endpoint_rx).await {
            Ok(Ok(path)) => path,
            Ok(Err(_)) => {
                reader.abort();
                return Err(TransportError::ConnectionClosed);
            }
            Err(_) => {
                reader.abort();
                return Err(TransportError::Timeout(timeout.as_millis() as u64));
            }
        };
        let post_url = base
            .join(&post_path)
            .map_err(|e| TransportError::Protocol(format!("invalid endpoint event {}: {}", post_path, e)))?;
        tracing::debug!(post_url = %post_url, "mcp sse endpoint received");

        Ok(Self {
            client,
            post_url: post_url.to_string(),
            pending,
            next_id: AtomicI64::new(1),
            alive,
            reader: Mutex::new(Some(reader)),
            timeout,
        })
    }

    async fn post(&self, body: String) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.post_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TransportError::Io(format!("HTTP request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Server(format!("HTTP error: {} - {}", status, text)));
        }
        Ok(())
    }

    fn remove_pending(&self, id: i64) {
        if let Ok(mut p) = self.pending.lock() {
            p.remove(&id);
        }
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| TransportError::ConnectionClosed)?
            .insert(id, tx);

        if let Err(e) = self.post(body).await {
            self.remove_pending(id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::ConnectionClosed),
            Err(_) => {
                self.remove_pending(id);
                Err(TransportError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        let body = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.post(body).await
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let reader = self.reader.lock().ok().and_then(|mut r| r.take());
        if let Some(reader) = reader {
            reader.abort();
        }
        if let Ok(mut p) = self.pending.lock() {
            p.clear();
        }
    }
}
