//! stdio 传输：子进程 MCP 服务器
//!
//! 写任务从 mpsc 取行写入 stdin；读任务逐行解析 stdout，按 id 把响应交给等待中的 oneshot；
//! stderr 每一行交给回调（发出 skillStderr 事件）。子进程 kill_on_drop，close 时显式 kill。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

use crate::core::TransportError;
use crate::skills::mcp::protocol::{IncomingMessage, JsonRpcNotification, JsonRpcRequest, McpTransport};

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, TransportError>>>>>;

/// stderr 行回调
pub type StderrHandler = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct StdioConfig {
    pub command: String,
    pub args: Vec<String>,
    /// 子进程的完整环境（不继承父进程）
    pub env: HashMap<String, String>,
    pub request_timeout: Duration,
}

pub struct StdioTransport {
    write_tx: mpsc::Sender<String>,
    pending: PendingMap,
    next_id: AtomicI64,
    alive: Arc<AtomicBool>,
    child: tokio::sync::Mutex<Option<Child>>,
    timeout: Duration,
}

impl StdioTransport {
    pub async fn spawn(config: &StdioConfig, on_stderr: StderrHandler) -> Result<Self, TransportError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .env_clear()
            .envs(&config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            TransportError::Io(format!("Failed to spawn process '{}': {}", config.command, e))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Io("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Io("Failed to get stdout".to_string()))?;
        let stderr = child.stderr.take();

        let alive = Arc::new(AtomicBool::new(true));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let (write_tx, mut write_rx) = mpsc::channel::<String>(256);
        let alive_writer = Arc::clone(&alive);
        tokio::spawn(async move {
            while let Some(line) = write_rx.recv().await {
                if !alive_writer.load(Ordering::SeqCst) {
                    break;
                }
                let written = match stdin.write_all(line.as_bytes()).await {
                    Ok(()) => stdin.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::warn!(error = %e, "mcp stdio write failed");
                    alive_writer.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        let pending_reader = Arc::clone(&pending);
        let alive_reader = Arc::clone(&alive);
        let mut reader = BufReader::new(stdout);
        tokio::spawn(async move {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<IncomingMessage>(trimmed) {
                            Ok(msg) => {
                                if let Some((id, result)) = msg.into_response() {
                                    let tx = pending_reader.lock().ok().and_then(|mut p| p.remove(&id));
                                    if let Some(tx) = tx {
                                        let _ = tx.send(result);
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, line = %trimmed, "unparseable mcp message");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "mcp stdio read failed");
                        break;
                    }
                }
            }
            alive_reader.store(false, Ordering::SeqCst);
            // 丢弃 sender 即唤醒所有等待者（ConnectionClosed）
            if let Ok(mut p) = pending_reader.lock() {
                p.clear();
            }
        });

        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    on_stderr(line);
                }
            });
        }

        Ok(Self {
            write_tx,
            pending,
            next_id: AtomicI64::new(1),
            alive,
            child: tokio::sync::Mutex::new(Some(child)),
            timeout: config.request_timeout,
        })
    }

    fn remove_pending(&self, id: i64) {
        if let Ok(mut p) = self.pending.lock() {
            p.remove(&id);
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = format!("{}\n", serde_json::to_string(&JsonRpcRequest::new(id, method, params))?);

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| TransportError::ConnectionClosed)?
            .insert(id, tx);
        tracing::debug!(id, method, "mcp request");

        if self.write_tx.send(line).await.is_err() {
            self.remove_pending(id);
            return Err(TransportError::ConnectionClosed);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.remove_pending(id);
                Err(TransportError::ConnectionClosed)
            }
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
        let line = format!("{}\n", serde_json::to_string(&JsonRpcNotification::new(method, params))?);
        self.write_tx
            .send(line)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "mcp child already exited");
            }
        }
        if let Ok(mut p) = self.pending.lock() {
            p.clear();
        }
    }
}
