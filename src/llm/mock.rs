//! 脚本化生成器（用于测试与离线演示，无需 API）
//!
//! 按顺序弹出预设的生成结果；脚本耗尽后返回致命错误。记录每次请求，便于断言工具列表等。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{Generation, GenerationError, GenerationRequest, LlmExecutor};

#[derive(Debug, Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<Generation, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, generation: Generation) -> Self {
        self.push(Ok(generation));
        self
    }

    pub fn then_error(self, error: GenerationError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, step: Result<Generation, GenerationError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
    }

    /// 已收到的请求（按时间顺序）
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmExecutor for ScriptedLlm {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GenerationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Err(GenerationError::Fatal("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderConfig;
    use std::time::Duration;

    fn request() -> GenerationRequest {
        GenerationRequest {
            messages: vec![],
            tools: vec![],
            model: "m".to_string(),
            provider_config: ProviderConfig::default(),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_scripted_llm_pops_in_order() {
        let llm = ScriptedLlm::new()
            .then(Generation::text("first"))
            .then_error(GenerationError::Transient("boom".to_string()));
        assert_eq!(llm.generate(request()).await.unwrap().text.as_deref(), Some("first"));
        assert!(llm.generate(request()).await.is_err());
        match llm.generate(request()).await {
            Err(GenerationError::Fatal(msg)) => assert!(msg.contains("exhausted")),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(llm.requests().len(), 3);
    }
}
