//! MCP 技能管理器：stdio / SSE / 进程内三种连接方式共用一套生命周期
//!
//! init = 建立连接 + initialize 握手 + notifications/initialized + tools/list；
//! 握手或发现失败时立刻关闭连接（kill 子进程）再返回错误。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{SkillError, TransportError};
use crate::events::{RuntimeEventKind, RuntimeEventSink};
use crate::model::{filter_tool_names, MessagePart, ToolDefinition};
use crate::skills::manager::{SkillKind, SkillManager, SkillState, StateCell};
use crate::skills::mcp::in_process::InProcessTransport;
use crate::skills::mcp::protocol::{initialize_params, parse_call_result, parse_tools_list, McpTransport};
use crate::skills::mcp::sse::SseTransport;
use crate::skills::mcp::stdio::{StdioConfig, StdioTransport};
use crate::tools::ToolRegistry;

/// 如何连接到 MCP 服务器
pub enum McpConnector {
    Stdio {
        command: String,
        args: Vec<String>,
        required_env: Vec<String>,
        /// 可供子进程使用的变量（来自 RunSetting.env）
        available_env: HashMap<String, String>,
    },
    Sse {
        endpoint: String,
    },
    InProcess(ToolRegistry),
}

pub struct McpSkillManager {
    name: String,
    connector: McpConnector,
    pick: Vec<String>,
    omit: Vec<String>,
    lazy: bool,
    request_timeout: Duration,
    sink: RuntimeEventSink,
    state: StateCell,
    transport: Mutex<Option<Arc<dyn McpTransport>>>,
    tools: RwLock<Vec<ToolDefinition>>,
}

impl McpSkillManager {
    pub fn new(name: impl Into<String>, connector: McpConnector, sink: RuntimeEventSink) -> Self {
        Self {
            name: name.into(),
            connector,
            pick: Vec::new(),
            omit: Vec::new(),
            lazy: false,
            request_timeout: Duration::from_secs(30),
            sink,
            state: StateCell::new(),
            transport: Mutex::new(None),
            tools: RwLock::new(Vec::new()),
        }
    }

    pub fn with_filter(mut self, pick: Vec<String>, omit: Vec<String>) -> Self {
        self.pick = pick;
        self.omit = omit;
        self
    }

    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn stdio_env(&self, required_env: &[String], available: &HashMap<String, String>) -> Result<HashMap<String, String>, SkillError> {
        let mut env = HashMap::new();
        if let Some(path) = available
            .get("PATH")
            .cloned()
            .or_else(|| std::env::var("PATH").ok())
        {
            env.insert("PATH".to_string(), path);
        }
        for var in required_env {
            let value = available.get(var).ok_or_else(|| SkillError::MissingEnv {
                skill: self.name.clone(),
                var: var.clone(),
            })?;
            env.insert(var.clone(), value.clone());
        }
        Ok(env)
    }

    async fn connect(&self) -> Result<Arc<dyn McpTransport>, SkillError> {
        match &self.connector {
            McpConnector::Stdio {
                command,
                args,
                required_env,
                available_env,
            } => {
                let env = self.stdio_env(required_env, available_env)?;
                self.sink.emit(RuntimeEventKind::SkillStarting {
                    skill_name: self.name.clone(),
                    command: command.clone(),
                    args: args.clone(),
                });
                let config = StdioConfig {
                    command: command.clone(),
                    args: args.clone(),
                    env,
                    request_timeout: self.request_timeout,
                };
                let sink = self.sink.clone();
                let skill_name = self.name.clone();
                let on_stderr = Arc::new(move |line: String| {
                    sink.emit(RuntimeEventKind::SkillStderr {
                        skill_name: skill_name.clone(),
                        message: line,
                    });
                });
                let transport = StdioTransport::spawn(&config, on_stderr)
                    .await
                    .map_err(|e| SkillError::SpawnFailed {
                        skill: self.name.clone(),
                        command: command.clone(),
                        message: e.to_string(),
                    })?;
                Ok(Arc::new(transport))
            }
            McpConnector::Sse { endpoint } => {
                self.sink.emit(RuntimeEventKind::SkillStarting {
                    skill_name: self.name.clone(),
                    command: endpoint.clone(),
                    args: Vec::new(),
                });
                let transport = SseTransport::connect(endpoint, self.request_timeout)
                    .await
                    .map_err(|source| SkillError::Transport {
                        skill: self.name.clone(),
                        source,
                    })?;
                Ok(Arc::new(transport))
            }
            McpConnector::InProcess(registry) => {
                Ok(Arc::new(InProcessTransport::new(self.name.clone(), registry.clone())))
            }
        }
    }

    async fn handshake(&self, transport: &dyn McpTransport) -> Result<Vec<ToolDefinition>, TransportError> {
        transport.request("initialize", initialize_params()).await?;
        transport.notify("notifications/initialized", json!({})).await?;
        let listed = transport.request("tools/list", json!({})).await?;
        let tools = parse_tools_list(listed)?
            .into_iter()
            .filter(|t| filter_tool_names(&t.name, &self.pick, &self.omit))
            .map(|t| ToolDefinition {
                skill_name: self.name.clone(),
                description: t.description.unwrap_or_default(),
                name: t.name,
                input_schema: t.input_schema,
                interactive: false,
            })
            .collect();
        Ok(tools)
    }

    fn current_transport(&self) -> Option<Arc<dyn McpTransport>> {
        self.transport.lock().ok().and_then(|t| t.clone())
    }

    fn take_transport(&self) -> Option<Arc<dyn McpTransport>> {
        self.transport.lock().ok().and_then(|mut t| t.take())
    }
}

#[async_trait]
impl SkillManager for McpSkillManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SkillKind {
        SkillKind::Mcp
    }

    fn lazy_init(&self) -> bool {
        self.lazy
    }

    async fn init(&self) -> Result<(), SkillError> {
        if !self
            .state
            .transition(SkillState::Uninitialized, SkillState::Initializing)
        {
            return match self.state.get() {
                SkillState::Ready => Ok(()),
                SkillState::Closed => Err(SkillError::Closed(self.name.clone())),
                _ => Err(SkillError::NotInitialized(self.name.clone())),
            };
        }

        let started = Instant::now();
        let transport = match self.connect().await {
            Ok(t) => t,
            Err(e) => {
                self.state.transition(SkillState::Initializing, SkillState::Failed);
                tracing::warn!(skill = %self.name, error = %e, "skill connect failed");
                return Err(e);
            }
        };

        let tools = match self.handshake(transport.as_ref()).await {
            Ok(tools) => tools,
            Err(source) => {
                transport.close().await;
                self.state.transition(SkillState::Initializing, SkillState::Failed);
                tracing::warn!(skill = %self.name, error = %source, "skill handshake failed");
                return Err(SkillError::Handshake {
                    skill: self.name.clone(),
                    source,
                });
            }
        };

        let tool_count = tools.len();
        if let Ok(mut slot) = self.tools.write() {
            *slot = tools;
        }
        if let Ok(mut slot) = self.transport.lock() {
            *slot = Some(Arc::clone(&transport));
        }
        if !self.state.transition(SkillState::Initializing, SkillState::Ready) {
            // init 期间已被 close
            if let Some(t) = self.take_transport() {
                t.close().await;
            }
            return Err(SkillError::Closed(self.name.clone()));
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(skill = %self.name, tool_count, duration_ms, "skill connected");
        self.sink.emit(RuntimeEventKind::SkillConnected {
            skill_name: self.name.clone(),
            tool_count,
            duration_ms,
        });
        Ok(())
    }

    fn state(&self) -> SkillState {
        self.state.get()
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        if self.state.get() != SkillState::Ready {
            return Vec::new();
        }
        self.tools.read().map(|t| t.clone()).unwrap_or_default()
    }

    async fn call_tool(&self, tool_name: &str, args: Value) -> Result<Vec<MessagePart>, SkillError> {
        match self.state.get() {
            SkillState::Ready => {}
            SkillState::Closed => return Err(SkillError::Closed(self.name.clone())),
            _ => return Err(SkillError::NotInitialized(self.name.clone())),
        }
        let known = self
            .tools
            .read()
            .map(|t| t.iter().any(|d| d.name == tool_name))
            .unwrap_or(false);
        if !known {
            return Err(SkillError::ToolNotFound {
                skill: self.name.clone(),
                tool: tool_name.to_string(),
            });
        }
        let transport = self
            .current_transport()
            .ok_or_else(|| SkillError::NotInitialized(self.name.clone()))?;
        let result = transport
            .request("tools/call", json!({ "name": tool_name, "arguments": args }))
            .await
            .map_err(|source| SkillError::Transport {
                skill: self.name.clone(),
                source,
            })?;
        let (is_error, parts) = parse_call_result(&result);
        if is_error {
            let message = parts
                .iter()
                .filter_map(|p| p.as_text())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(SkillError::ToolFailed {
                tool: tool_name.to_string(),
                message,
            });
        }
        Ok(parts)
    }

    async fn close(&self) {
        let Some(previous) = self.state.close() else {
            return;
        };
        if let Some(transport) = self.take_transport() {
            transport.close().await;
        }
        if previous == SkillState::Ready {
            tracing::info!(skill = %self.name, "skill disconnected");
            self.sink.emit(RuntimeEventKind::SkillDisconnected {
                skill_name: self.name.clone(),
            });
        }
    }
}
