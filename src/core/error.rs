//! 运行时错误类型
//!
//! 分层：TransportError（MCP 连接）→ SkillError（技能生命周期）→ RuntimeError（整次运行）。
//! 工具执行失败不会走到这里，而是在调度层转成错误形态的 ToolResult。

use thiserror::Error;

use crate::runtime::RunState;

/// MCP 传输层错误（stdio / SSE / 进程内）
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// 技能（工具提供方）生命周期错误
#[derive(Error, Debug, Clone)]
pub enum SkillError {
    #[error("Skill {0} is not initialized")]
    NotInitialized(String),

    #[error("Skill {0} is closed")]
    Closed(String),

    #[error("Skill {skill} requires environment variable {var}")]
    MissingEnv { skill: String, var: String },

    #[error("Failed to spawn skill {skill} ({command}): {message}")]
    SpawnFailed {
        skill: String,
        command: String,
        message: String,
    },

    #[error("Skill {skill} handshake failed: {source}")]
    Handshake {
        skill: String,
        #[source]
        source: TransportError,
    },

    #[error("Skill {skill} transport error: {source}")]
    Transport {
        skill: String,
        #[source]
        source: TransportError,
    },

    #[error("Tool {tool} not found in skill {skill}")]
    ToolNotFound { skill: String, tool: String },

    /// 委派技能只由调度器拦截，从不直接调用
    #[error("Skill {0} cannot be called directly")]
    NotCallable(String),

    #[error("Tool {tool} failed: {message}")]
    ToolFailed { tool: String, message: String },
}

/// 存储层错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Checkpoint not found: {job_id}/{checkpoint_id}")]
    NotFound {
        job_id: String,
        checkpoint_id: String,
    },

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 一次运行中可能出现的致命错误
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Skill(#[from] SkillError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Expert not found: {0}")]
    ExpertNotFound(String),

    #[error("Invalid transition from {state:?} on event {event}")]
    InvalidTransition { state: RunState, event: &'static str },

    #[error("Delegation error: {0}")]
    Delegation(String),

    #[error("Cannot resume run: {0}")]
    InvalidResume(String),

    #[error("Config error: {0}")]
    Config(String),
}
