//! 运行协调器：驱动一次状态机运行直到停止
//!
//! 每次转移：逻辑函数产生事件 → 查转移表 → 更新上下文 → 持久化快照 → 发出事件 → 询问 ContinuePolicy。
//! 任何退出路径都会关闭本次运行的全部技能管理器。

use std::sync::Arc;

use crate::core::{ContinuePolicy, RuntimeError};
use crate::events::{EventEmitter, RunEvent};
use crate::model::{Checkpoint, RunSetting};
use crate::runtime::logic::{run_logic, LogicDeps};
use crate::runtime::machine::{next_state, RunContext, RunState};
use crate::storage::CheckpointStore;

pub struct RunCoordinator {
    deps: LogicDeps,
    store: Arc<dyn CheckpointStore>,
    emitter: EventEmitter,
    policy: Arc<dyn ContinuePolicy>,
}

impl RunCoordinator {
    pub fn new(
        deps: LogicDeps,
        store: Arc<dyn CheckpointStore>,
        emitter: EventEmitter,
        policy: Arc<dyn ContinuePolicy>,
    ) -> Self {
        Self {
            deps,
            store,
            emitter,
            policy,
        }
    }

    /// 返回最终快照；被策略提前停止时快照保持非终态
    pub async fn execute(&self, setting: RunSetting, checkpoint: Checkpoint) -> Result<Checkpoint, RuntimeError> {
        let result = self.drive(setting, checkpoint).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "run failed, closing skills");
        }
        self.deps.skills.close_all().await;
        result
    }

    async fn drive(&self, setting: RunSetting, checkpoint: Checkpoint) -> Result<Checkpoint, RuntimeError> {
        let mut ctx = RunContext::new(setting, checkpoint);
        let mut state = RunState::Init;

        loop {
            let mut event = run_logic(state, &ctx, &self.deps).await?;
            let name = event.name();
            let next = next_state(state, name).ok_or(RuntimeError::InvalidTransition { state, event: name })?;
            tracing::debug!(from = ?state, to = ?next, event = name, "transition");

            if let Some(checkpoint) = event.checkpoint_mut() {
                checkpoint.todos = self.deps.todos.items();
            }
            let step_number = ctx.step.step_number;
            ctx.apply(&event);
            if let Some(checkpoint) = event.checkpoint() {
                self.store.store_checkpoint(checkpoint).await?;
            }
            self.emitter.emit_run(RunEvent::new(
                ctx.setting.job_id.clone(),
                ctx.setting.run_id.clone(),
                ctx.setting.expert_key.clone(),
                step_number,
                event,
            ));

            state = next;
            if state.is_stopped() {
                tracing::info!(
                    expert = %ctx.setting.expert_key,
                    status = ctx.checkpoint.status.as_str(),
                    step = ctx.checkpoint.step_number,
                    "run stopped"
                );
                return Ok(ctx.checkpoint);
            }
            if !self
                .policy
                .should_continue(&ctx.setting, &ctx.checkpoint, &ctx.step)
                .await
            {
                tracing::info!(state = ?state, "run stopped by continue policy");
                return Ok(ctx.checkpoint);
            }
        }
    }
}
