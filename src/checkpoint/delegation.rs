//! 委派移交与返回
//!
//! 两个纯函数：父快照（stoppedByDelegate）→ 子运行的 (setting, checkpoint)；
//! 子运行完成快照 + 父快照 → 父运行的续跑状态。

use crate::core::RuntimeError;
use crate::model::{
    new_id, now_millis, Checkpoint, CheckpointAction, CheckpointStatus, DelegatedBy,
    InteractiveToolCallResult, RunInput, RunSetting,
};

/// 委派返回时的附加信息（子运行最后一条消息没有文本时给出警告）
#[derive(Debug, Clone, PartialEq)]
pub struct DelegationReturn {
    pub setting: RunSetting,
    pub checkpoint: Checkpoint,
    pub warning: Option<String>,
}

/// 为第一个委派目标构造子运行
pub fn build_delegate_to_state(
    setting: &RunSetting,
    checkpoint: &Checkpoint,
) -> Result<(RunSetting, Checkpoint), RuntimeError> {
    let target = checkpoint
        .delegate_to
        .as_ref()
        .and_then(|targets| targets.first())
        .ok_or_else(|| RuntimeError::Delegation("checkpoint has no delegation target".to_string()))?;

    if !setting.experts.contains_key(&target.expert.key) {
        return Err(RuntimeError::ExpertNotFound(target.expert.key.clone()));
    }

    let mut child_setting = setting.clone();
    child_setting.expert_key = target.expert.key.clone();
    child_setting.run_id = new_id();
    child_setting.input = RunInput::text(target.query.clone());
    child_setting.updated_at = now_millis();

    let child_checkpoint = Checkpoint {
        id: new_id(),
        job_id: checkpoint.job_id.clone(),
        run_id: child_setting.run_id.clone(),
        expert: target.expert.clone(),
        step_number: 1,
        status: CheckpointStatus::Init,
        messages: Vec::new(),
        usage: checkpoint.usage,
        context_window: checkpoint.context_window,
        context_window_usage: checkpoint.context_window.map(|_| 0.0),
        delegated_by: Some(DelegatedBy {
            expert: checkpoint.expert.clone(),
            tool_call_id: target.tool_call_id.clone(),
            tool_name: target.tool_name.clone(),
            checkpoint_id: checkpoint.id.clone(),
            outer: None,
        }),
        delegate_to: None,
        pending_tool_calls: None,
        partial_tool_results: None,
        todos: Vec::new(),
        action: CheckpointAction::Init,
    };

    Ok((child_setting, child_checkpoint))
}

/// 子运行完成后回到父运行
pub fn build_delegation_return_state(
    setting: &RunSetting,
    child_checkpoint: &Checkpoint,
    parent_checkpoint: &Checkpoint,
) -> Result<DelegationReturn, RuntimeError> {
    let delegated_by = child_checkpoint.delegated_by.as_ref().ok_or_else(|| {
        RuntimeError::Delegation(format!(
            "checkpoint {} was not produced by a delegated run",
            child_checkpoint.id
        ))
    })?;

    let answer = child_checkpoint
        .last_message_text()
        .filter(|text| !text.trim().is_empty());
    let (text, warning) = match answer {
        Some(text) => (text, None),
        None => {
            let warning = format!(
                "delegated expert {} finished without a text answer",
                child_checkpoint.expert.key
            );
            tracing::warn!(
                child_run_id = %child_checkpoint.run_id,
                tool_call_id = %delegated_by.tool_call_id,
                "{}",
                warning
            );
            (String::new(), Some(warning))
        }
    };

    let mut parent_setting = setting.clone();
    parent_setting.expert_key = parent_checkpoint.expert.key.clone();
    parent_setting.run_id = parent_checkpoint.run_id.clone();
    parent_setting.input = RunInput::tool_result(InteractiveToolCallResult {
        tool_call_id: delegated_by.tool_call_id.clone(),
        tool_name: delegated_by.tool_name.clone(),
        skill_name: child_checkpoint.expert.key.clone(),
        text,
    });
    parent_setting.updated_at = now_millis();

    let mut checkpoint = parent_checkpoint.clone();
    checkpoint.id = new_id();
    checkpoint.usage = child_checkpoint.usage;
    checkpoint.status = CheckpointStatus::Proceeding;
    checkpoint.delegate_to = None;
    checkpoint.delegated_by = delegated_by.outer.as_deref().cloned();
    checkpoint.action = CheckpointAction::ReturnFromDelegate;
    let checkpoint = checkpoint.with_context_window_usage();

    Ok(DelegationReturn {
        setting: parent_setting,
        checkpoint,
        warning,
    })
}
