//! 生成器抽象
//!
//! 核心只依赖 LlmExecutor：给定消息与工具定义，返回工具调用和/或文本以及用量。
//! 具体后端（OpenAI 兼容 / 脚本化）在同目录下实现。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Message, ProviderConfig, ToolCall, ToolDefinition, Usage};

/// 生成失败：可重试（超时、限流、瞬时错误）或致命
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Generation timed out after {0}ms")]
    Timeout(u64),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Provider error: {0}")]
    Fatal(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::Fatal(_))
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    /// 为空表示本次生成不允许调用工具（GeneratingRunResult）
    pub tools: Vec<ToolDefinition>,
    pub model: String,
    pub provider_config: ProviderConfig,
    pub timeout: Duration,
}

/// 一次生成的结果；tool_calls 中的 skill_name 由运行时按工具名补全
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// 追加一个工具调用（id 自动生成）
    pub fn with_tool_call(mut self, tool_name: impl Into<String>, args: serde_json::Value) -> Self {
        self.tool_calls.push(ToolCall {
            id: crate::model::new_id(),
            skill_name: String::new(),
            tool_name: tool_name.into(),
            args,
        });
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

#[async_trait]
pub trait LlmExecutor: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError>;
}
