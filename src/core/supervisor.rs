//! 运行监管：外部续跑策略
//!
//! Coordinator 在每次非终态转移后询问 ContinuePolicy；返回 false 时提前停止并清理资源。
//! RunSupervisor 持有 CancellationToken（用户 Ctrl+C 时取消）与可选的 token 预算。

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::model::{Checkpoint, RunSetting, Step};

/// 是否继续运行的外部策略（粗粒度：每次转移检查一次，不打断进行中的工具调用）
#[async_trait]
pub trait ContinuePolicy: Send + Sync {
    async fn should_continue(&self, setting: &RunSetting, checkpoint: &Checkpoint, step: &Step) -> bool;
}

/// 闭包形式的策略
pub struct FnPolicy<F>(F);

/// 用闭包构造策略
pub fn continue_while<F>(f: F) -> FnPolicy<F>
where
    F: Fn(&RunSetting, &Checkpoint, &Step) -> bool + Send + Sync,
{
    FnPolicy(f)
}

#[async_trait]
impl<F> ContinuePolicy for FnPolicy<F>
where
    F: Fn(&RunSetting, &Checkpoint, &Step) -> bool + Send + Sync,
{
    async fn should_continue(&self, setting: &RunSetting, checkpoint: &Checkpoint, step: &Step) -> bool {
        (self.0)(setting, checkpoint, step)
    }
}

/// 取消令牌 + token 预算
#[derive(Debug, Clone)]
pub struct RunSupervisor {
    cancel_token: CancellationToken,
    max_total_tokens: Option<u64>,
}

impl RunSupervisor {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            max_total_tokens: None,
        }
    }

    /// 累计 total_tokens 超出预算后停止
    pub fn with_token_budget(mut self, max_total_tokens: u64) -> Self {
        self.max_total_tokens = Some(max_total_tokens);
        self
    }

    /// 触发取消（用户 Ctrl+C）
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Default for RunSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContinuePolicy for RunSupervisor {
    async fn should_continue(&self, _setting: &RunSetting, checkpoint: &Checkpoint, step: &Step) -> bool {
        if self.cancel_token.is_cancelled() {
            tracing::info!(run_id = %checkpoint.run_id, "run cancelled by supervisor");
            return false;
        }
        if let Some(budget) = self.max_total_tokens {
            // 本步用量在 FinishingStep 才折叠进快照
            let spent = checkpoint
                .usage
                .total_tokens
                .saturating_add(step.usage.total_tokens);
            if spent > budget {
                tracing::info!(run_id = %checkpoint.run_id, spent, budget, "token budget exhausted");
                return false;
            }
        }
        true
    }
}
