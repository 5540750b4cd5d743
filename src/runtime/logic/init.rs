//! Init：新输入 → instruction + user 消息；带交互式工具结果的续跑 → 折叠进部分结果

use crate::core::RuntimeError;
use crate::events::RunEventKind;
use crate::model::{
    new_id, CheckpointAction, CheckpointStatus, Expert, InteractiveToolCallResult, Message,
    MessagePart, ToolResult,
};
use crate::runtime::machine::RunContext;

pub fn init_logic(ctx: &RunContext) -> Result<RunEventKind, RuntimeError> {
    let setting = &ctx.setting;
    let expert = setting
        .expert()
        .ok_or_else(|| RuntimeError::ExpertNotFound(setting.expert_key.clone()))?;

    if let Some(result) = &setting.input.interactive_tool_call_result {
        return resume(ctx, result);
    }

    let text = setting
        .input
        .text
        .as_deref()
        .ok_or_else(|| RuntimeError::InvalidResume("run input has neither text nor tool result".to_string()))?;

    let mut input_messages = Vec::new();
    if ctx.checkpoint.messages.is_empty() {
        input_messages.push(Message::instruction(instruction_text(expert)));
    }
    input_messages.push(Message::user(text));

    let mut checkpoint = ctx.checkpoint.clone();
    if checkpoint.status.is_terminal() {
        checkpoint.step_number += 1;
    }
    checkpoint.id = new_id();
    checkpoint.run_id = setting.run_id.clone();
    checkpoint.status = CheckpointStatus::Proceeding;
    checkpoint.action = CheckpointAction::StartRun;
    checkpoint.delegate_to = None;
    checkpoint.pending_tool_calls = None;
    checkpoint.partial_tool_results = None;
    checkpoint.messages.extend(input_messages.iter().cloned());

    Ok(RunEventKind::StartRun {
        checkpoint,
        input_messages,
    })
}

fn resume(ctx: &RunContext, result: &InteractiveToolCallResult) -> Result<RunEventKind, RuntimeError> {
    let mut pending = ctx.checkpoint.pending_tool_calls.clone().unwrap_or_default();
    let position = pending
        .iter()
        .position(|c| c.id == result.tool_call_id)
        .ok_or_else(|| {
            RuntimeError::InvalidResume(format!(
                "checkpoint {} has no pending tool call {}",
                ctx.checkpoint.id, result.tool_call_id
            ))
        })?;
    let call = pending.remove(position);

    let mut partial = ctx.checkpoint.partial_tool_results.clone().unwrap_or_default();
    partial.push(ToolResult {
        id: call.id,
        skill_name: result.skill_name.clone(),
        tool_name: result.tool_name.clone(),
        result: vec![MessagePart::text(result.text.clone())],
    });

    let mut checkpoint = ctx.checkpoint.clone();
    checkpoint.id = new_id();
    checkpoint.run_id = ctx.setting.run_id.clone();
    checkpoint.status = CheckpointStatus::Proceeding;
    checkpoint.action = CheckpointAction::ResumeToolCalls;
    checkpoint.delegate_to = None;
    checkpoint.pending_tool_calls = Some(pending.clone());
    checkpoint.partial_tool_results = Some(partial.clone());

    tracing::info!(
        tool_call_id = %result.tool_call_id,
        pending = pending.len(),
        "resuming tool calls"
    );
    Ok(RunEventKind::ResumeToolCalls {
        checkpoint,
        pending_tool_calls: pending,
        partial_tool_results: partial,
    })
}

/// Expert 指令 + 各技能的使用规则
pub fn instruction_text(expert: &Expert) -> String {
    let mut text = expert.instruction.clone();
    for (name, skill) in &expert.skills {
        if let Some(rule) = skill.rule() {
            text.push_str(&format!("\n\n## Skill: {}\n{}", name, rule));
        }
    }
    text
}
