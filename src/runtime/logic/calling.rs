//! CallingTool / CallingDelegate / CallingInteractiveTool

use crate::checkpoint::finish_checkpoint;
use crate::core::RuntimeError;
use crate::events::RunEventKind;
use crate::model::{CheckpointAction, CheckpointStatus};
use crate::runtime::logic::LogicDeps;
use crate::runtime::machine::RunContext;

pub async fn calling_tool_logic(ctx: &RunContext, deps: &LogicDeps) -> Result<RunEventKind, RuntimeError> {
    let calls = ctx.step.pending_tool_calls.clone().unwrap_or_default();
    let partial = ctx.step.partial_tool_results.clone().unwrap_or_default();
    deps.dispatcher
        .dispatch(&ctx.setting, &calls, partial, &deps.skills)
        .await
}

/// 暂停本 Expert：快照记录委派目标、挂起调用与已有结果
pub fn calling_delegate_logic(ctx: &RunContext) -> Result<RunEventKind, RuntimeError> {
    if ctx.delegate_to.is_empty() {
        return Err(RuntimeError::Delegation("no delegation target selected".to_string()));
    }
    let mut checkpoint = finish_checkpoint(
        &ctx.checkpoint,
        &ctx.step,
        CheckpointStatus::StoppedByDelegate,
        CheckpointAction::StopRunByDelegate,
    );
    // delegatedBy 与 delegateTo 互斥；父方的 delegatedBy 由运行驱动挂到子方的 outer 上
    checkpoint.delegated_by = None;
    checkpoint.delegate_to = Some(ctx.delegate_to.clone());
    checkpoint.pending_tool_calls = ctx.step.pending_tool_calls.clone();
    checkpoint.partial_tool_results = ctx.step.partial_tool_results.clone();
    Ok(RunEventKind::StopRunByDelegate { checkpoint })
}

pub fn calling_interactive_tool_logic(ctx: &RunContext) -> Result<RunEventKind, RuntimeError> {
    let mut checkpoint = finish_checkpoint(
        &ctx.checkpoint,
        &ctx.step,
        CheckpointStatus::StoppedByInteractiveTool,
        CheckpointAction::StopRunByInteractiveTool,
    );
    checkpoint.delegate_to = None;
    checkpoint.pending_tool_calls = ctx.step.pending_tool_calls.clone();
    checkpoint.partial_tool_results = ctx.step.partial_tool_results.clone();
    Ok(RunEventKind::StopRunByInteractiveTool { checkpoint })
}
