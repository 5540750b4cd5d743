//! 生成失败的恢复策略
//!
//! 根据 GenerationError 与当前重试次数给出 RecoveryAction，供 GeneratingStep / GeneratingRunResult 决定是
//! 发出 retry 事件还是以 stoppedByError 终止。

use crate::llm::GenerationError;

/// 恢复引擎给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 原样重试（瞬时错误）
    Retry(String),
    /// 注入提示后重试（例如模型只给了文本、没有调用工具）
    RetryWithPrompt(String),
    /// 终止运行
    Abort(String),
}

const MISSING_TOOL_CALL_PROMPT: &str = "You did not call any tool. \
Call one of the available tools to make progress, \
or call attemptCompletion when the task is finished.";

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 生成调用失败：可重试错误在未超出 max_retries 时重试，否则终止
    pub fn on_generation_error(
        &self,
        err: &GenerationError,
        retry_count: u32,
        max_retries: u32,
    ) -> RecoveryAction {
        if !err.is_retryable() {
            return RecoveryAction::Abort(err.to_string());
        }
        if retry_count >= max_retries {
            return RecoveryAction::Abort(format!(
                "{} (gave up after {} retries)",
                err, retry_count
            ));
        }
        RecoveryAction::Retry(err.to_string())
    }

    /// 模型没有调用任何工具：提示后重试，同样受 max_retries 约束
    pub fn on_missing_tool_call(&self, retry_count: u32, max_retries: u32) -> RecoveryAction {
        if retry_count >= max_retries {
            return RecoveryAction::Abort(format!(
                "Expert produced no tool call after {} retries",
                retry_count
            ));
        }
        RecoveryAction::RetryWithPrompt(MISSING_TOOL_CALL_PROMPT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_retries_transient_error() {
        let engine = RecoveryEngine::new();
        let err = GenerationError::Timeout(1000);
        let action = engine.on_generation_error(&err, 0, 3);
        assert!(matches!(action, RecoveryAction::Retry(_)));
    }

    #[test]
    fn test_recovery_aborts_after_max_retries() {
        let engine = RecoveryEngine::new();
        let err = GenerationError::RateLimited {
            retry_after_ms: 1000,
        };
        let action = engine.on_generation_error(&err, 3, 3);
        match action {
            RecoveryAction::Abort(msg) => assert!(msg.contains("3 retries")),
            other => panic!("Expected Abort, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_aborts_fatal_error_immediately() {
        let engine = RecoveryEngine::new();
        let err = GenerationError::Fatal("invalid api key".to_string());
        let action = engine.on_generation_error(&err, 0, 5);
        assert!(matches!(action, RecoveryAction::Abort(_)));
    }

    #[test]
    fn test_recovery_missing_tool_call() {
        let engine = RecoveryEngine::new();
        match engine.on_missing_tool_call(0, 2) {
            RecoveryAction::RetryWithPrompt(msg) => assert!(msg.contains("attemptCompletion")),
            other => panic!("Expected RetryWithPrompt, got {:?}", other),
        }
        assert!(matches!(
            engine.on_missing_tool_call(2, 2),
            RecoveryAction::Abort(_)
        ));
    }
}
