//! 运行驱动：跨委派移交与返回串联多次协调器执行
//!
//! 父 Expert 在 stoppedByDelegate 处完全挂起，子运行结束后从存储取回父快照继续。

use std::sync::Arc;
use std::time::Duration;

use crate::checkpoint::{build_delegate_to_state, build_delegation_return_state, create_initial_checkpoint};
use crate::core::{ContinuePolicy, RecoveryEngine, RuntimeError};
use crate::events::{EventEmitter, RuntimeEventKind};
use crate::llm::LlmExecutor;
use crate::model::{Checkpoint, CheckpointStatus, RunSetting};
use crate::runtime::coordinator::RunCoordinator;
use crate::runtime::logic::LogicDeps;
use crate::skills::{build_skill_managers, SkillOptions};
use crate::storage::CheckpointStore;
use crate::tools::todo::TodoList;
use crate::tools::ToolDispatcher;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub skills: SkillOptions,
    pub tool_timeout: Duration,
    pub max_concurrent_tools: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skills: SkillOptions::default(),
            tool_timeout: Duration::from_secs(60),
            max_concurrent_tools: 8,
        }
    }
}

pub struct RunParams {
    pub setting: RunSetting,
    /// None：从初始快照开始
    pub checkpoint: Option<Checkpoint>,
    pub llm: Arc<dyn LlmExecutor>,
    pub store: Arc<dyn CheckpointStore>,
    pub emitter: EventEmitter,
    pub policy: Arc<dyn ContinuePolicy>,
    pub options: RunOptions,
}

pub async fn run(params: RunParams) -> Result<Checkpoint, RuntimeError> {
    let RunParams {
        mut setting,
        checkpoint,
        llm,
        store,
        emitter,
        policy,
        options,
    } = params;

    let mut checkpoint = match checkpoint {
        Some(checkpoint) => checkpoint,
        None => {
            let expert = setting
                .expert()
                .ok_or_else(|| RuntimeError::ExpertNotFound(setting.expert_key.clone()))?;
            create_initial_checkpoint(&setting, expert)
        }
    };

    loop {
        let sink = emitter.scoped(setting.job_id.clone(), setting.run_id.clone());
        sink.emit(RuntimeEventKind::InitializeRuntime {
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
            expert_key: setting.expert_key.clone(),
            model: setting.model.clone(),
            query: setting.input.text.clone(),
        });

        let todos = TodoList::from_items(checkpoint.todos.clone());
        let skills = build_skill_managers(&setting, &options.skills, &todos, sink.clone())?;
        skills.init_all().await?;

        let coordinator = RunCoordinator::new(
            LogicDeps {
                llm: Arc::clone(&llm),
                skills,
                dispatcher: ToolDispatcher::new(options.tool_timeout, options.max_concurrent_tools),
                recovery: RecoveryEngine::new(),
                todos,
            },
            Arc::clone(&store),
            emitter.clone(),
            Arc::clone(&policy),
        );
        let outer = checkpoint.delegated_by.clone();
        let finished = coordinator.execute(setting.clone(), checkpoint).await?;

        match finished.status {
            CheckpointStatus::StoppedByDelegate => {
                let (child_setting, mut child_checkpoint) = build_delegate_to_state(&setting, &finished)?;
                if let Some(by) = child_checkpoint.delegated_by.as_mut() {
                    by.outer = outer.map(Box::new);
                }
                tracing::info!(
                    from = %setting.expert_key,
                    to = %child_setting.expert_key,
                    "delegating"
                );
                setting = child_setting;
                checkpoint = child_checkpoint;
            }
            CheckpointStatus::Completed if finished.delegated_by.is_some() => {
                let parent_id = finished
                    .delegated_by
                    .as_ref()
                    .map(|d| d.checkpoint_id.clone())
                    .unwrap_or_default();
                let parent = store.retrieve_checkpoint(&finished.job_id, &parent_id).await?;
                let returned = build_delegation_return_state(&setting, &finished, &parent)?;

                if let Some(message) = returned.warning {
                    let tool_call_id = returned
                        .setting
                        .input
                        .interactive_tool_call_result
                        .as_ref()
                        .map(|r| r.tool_call_id.clone())
                        .unwrap_or_default();
                    emitter
                        .scoped(returned.setting.job_id.clone(), returned.setting.run_id.clone())
                        .emit(RuntimeEventKind::DelegationWarning {
                            tool_call_id,
                            expert_key: setting.expert_key.clone(),
                            message,
                        });
                }

                store.store_checkpoint(&returned.checkpoint).await?;
                tracing::info!(
                    from = %setting.expert_key,
                    to = %returned.setting.expert_key,
                    "returning from delegation"
                );
                setting = returned.setting;
                checkpoint = returned.checkpoint;
            }
            _ => return Ok(finished),
        }
    }
}
