//! GeneratingStep / GeneratingRunResult：调用生成器，按恢复策略决定 retry 或终止

use std::time::Duration;

use crate::checkpoint::finish_checkpoint;
use crate::core::{RecoveryAction, RuntimeError};
use crate::events::RunEventKind;
use crate::llm::{Generation, GenerationError, GenerationRequest};
use crate::model::{
    CheckpointAction, CheckpointStatus, Message, MessagePart, ToolDefinition, Usage,
};
use crate::runtime::logic::LogicDeps;
use crate::runtime::machine::RunContext;

const SKIPPED_TOOL_CALL: &str = "Skipped: the task was completed before this tool call ran.";

/// 限流等待的上限
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

pub async fn generating_step_logic(ctx: &RunContext, deps: &LogicDeps) -> Result<RunEventKind, RuntimeError> {
    let messages: Vec<Message> = ctx.step.messages().cloned().collect();
    let tools = deps.skills.tool_definitions();

    let generation = match generate(ctx, deps, messages, tools).await {
        Ok(generation) => generation,
        Err(err) => return Ok(on_error(ctx, deps, &err).await),
    };

    if generation.tool_calls.is_empty() {
        let action = deps
            .recovery
            .on_missing_tool_call(ctx.step.retry_count, ctx.setting.max_retries);
        return Ok(match action {
            RecoveryAction::RetryWithPrompt(prompt) | RecoveryAction::Retry(prompt) => {
                let mut new_messages = Vec::new();
                if let Some(text) = generation.text.filter(|t| !t.is_empty()) {
                    new_messages.push(Message::expert_text(text));
                }
                new_messages.push(Message::user(prompt));
                tracing::warn!(retry = ctx.step.retry_count + 1, "no tool call, nudging expert");
                RunEventKind::Retry {
                    reason: "no tool call".to_string(),
                    new_messages,
                    usage: generation.usage,
                }
            }
            RecoveryAction::Abort(message) => stop_by_error(ctx, message, generation.usage),
        });
    }

    let mut tool_calls = generation.tool_calls;
    for call in tool_calls.iter_mut() {
        if let Some((manager, _)) = deps.skills.find_by_tool(&call.tool_name) {
            call.skill_name = manager.name().to_string();
        }
    }

    let mut contents = Vec::new();
    if let Some(text) = generation.text.filter(|t| !t.is_empty()) {
        contents.push(MessagePart::text(text));
    }
    contents.extend(tool_calls.iter().map(|c| MessagePart::ToolCallPart {
        tool_call_id: c.id.clone(),
        tool_name: c.tool_name.clone(),
        args: c.args.clone(),
    }));

    tracing::info!(
        step = ctx.step.step_number,
        tool_calls = tool_calls.len(),
        "expert called tools"
    );
    Ok(RunEventKind::CallTools {
        new_message: Message::expert(contents),
        tool_calls,
        usage: generation.usage,
    })
}

pub async fn generating_run_result_logic(
    ctx: &RunContext,
    deps: &LogicDeps,
) -> Result<RunEventKind, RuntimeError> {
    let tool_message = completion_tool_message(ctx);
    let mut messages: Vec<Message> = ctx.step.messages().cloned().collect();
    messages.push(tool_message.clone());

    let generation = match generate(ctx, deps, messages, Vec::new()).await {
        Ok(generation) => generation,
        Err(err) => return Ok(on_error(ctx, deps, &err).await),
    };

    let text = generation.text.unwrap_or_default();
    let mut step = ctx.step.clone();
    step.new_messages.push(tool_message);
    step.new_messages.push(Message::expert_text(text.clone()));
    step.usage += generation.usage;
    let checkpoint = finish_checkpoint(
        &ctx.checkpoint,
        &step,
        CheckpointStatus::Completed,
        CheckpointAction::CompleteRun,
    );

    tracing::info!(
        expert = %ctx.setting.expert_key,
        step = ctx.step.step_number,
        total_tokens = checkpoint.usage.total_tokens,
        "run completed"
    );
    Ok(RunEventKind::CompleteRun {
        checkpoint,
        text,
        usage: generation.usage,
    })
}

async fn generate(
    ctx: &RunContext,
    deps: &LogicDeps,
    messages: Vec<Message>,
    tools: Vec<ToolDefinition>,
) -> Result<Generation, GenerationError> {
    let timeout = ctx.setting.timeout_duration();
    let request = GenerationRequest {
        messages,
        tools,
        model: ctx.setting.model.clone(),
        provider_config: ctx.setting.provider_config.clone(),
        timeout,
    };
    match tokio::time::timeout(timeout, deps.llm.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(ctx.setting.timeout)),
    }
}

async fn on_error(ctx: &RunContext, deps: &LogicDeps, err: &GenerationError) -> RunEventKind {
    let action = deps
        .recovery
        .on_generation_error(err, ctx.step.retry_count, ctx.setting.max_retries);
    match action {
        RecoveryAction::Retry(reason) | RecoveryAction::RetryWithPrompt(reason) => {
            if let GenerationError::RateLimited { retry_after_ms } = err {
                tokio::time::sleep(Duration::from_millis(*retry_after_ms).min(MAX_RATE_LIMIT_WAIT)).await;
            }
            tracing::warn!(retry = ctx.step.retry_count + 1, error = %err, "generation failed, retrying");
            RunEventKind::Retry {
                reason,
                new_messages: Vec::new(),
                usage: Usage::default(),
            }
        }
        RecoveryAction::Abort(message) => {
            tracing::error!(error = %message, "generation failed, stopping run");
            stop_by_error(ctx, message, Usage::default())
        }
    }
}

fn stop_by_error(ctx: &RunContext, message: String, usage: Usage) -> RunEventKind {
    let mut step = ctx.step.clone();
    step.usage += usage;
    let checkpoint = finish_checkpoint(
        &ctx.checkpoint,
        &step,
        CheckpointStatus::StoppedByError,
        CheckpointAction::StopRunByError {
            message: message.clone(),
        },
    );
    RunEventKind::StopRunByError {
        checkpoint,
        error: message,
    }
}

/// 覆盖本步全部调用的工具消息：已有部分结果、attemptCompletion 结果，其余标记为跳过
fn completion_tool_message(ctx: &RunContext) -> Message {
    let completed = ctx.step.tool_results.clone().unwrap_or_default();
    let mut parts: Vec<MessagePart> = ctx
        .step
        .partial_tool_results
        .iter()
        .flatten()
        .map(|r| MessagePart::ToolResultPart {
            tool_call_id: r.id.clone(),
            tool_name: r.tool_name.clone(),
            contents: r.result.clone(),
        })
        .collect();

    for call in ctx.step.tool_calls.iter().flatten() {
        let contents = completed
            .iter()
            .find(|r| r.id == call.id)
            .map(|r| r.result.clone())
            .unwrap_or_else(|| vec![MessagePart::text(SKIPPED_TOOL_CALL)]);
        parts.push(MessagePart::ToolResultPart {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            contents,
        });
    }
    Message::tool(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::create_initial_checkpoint;
    use crate::core::RecoveryEngine;
    use crate::llm::ScriptedLlm;
    use crate::model::{Expert, RunInput, RunSetting, ToolCall, ToolResult};
    use crate::skills::SkillManagers;
    use crate::tools::todo::TodoList;
    use crate::tools::ToolDispatcher;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn context() -> RunContext {
        let expert = Expert::new("writer", "Writer", "w");
        let mut experts = HashMap::new();
        experts.insert("writer".to_string(), expert.clone());
        let mut setting = RunSetting::new("job", "writer", experts, "m", RunInput::text("go"));
        setting.max_retries = 1;
        let mut checkpoint = create_initial_checkpoint(&setting, &expert);
        checkpoint.messages.push(Message::user("go"));
        RunContext::new(setting, checkpoint)
    }

    fn deps(llm: ScriptedLlm) -> LogicDeps {
        LogicDeps {
            llm: Arc::new(llm),
            skills: SkillManagers::new(),
            dispatcher: ToolDispatcher::new(Duration::from_secs(1), 1),
            recovery: RecoveryEngine::new(),
            todos: TodoList::new(),
        }
    }

    #[tokio::test]
    async fn test_text_only_answer_is_nudged_then_aborted() {
        let deps = deps(ScriptedLlm::new().then(Generation::text("just text")).then(Generation::text("again")));
        let mut ctx = context();

        let event = generating_step_logic(&ctx, &deps).await.unwrap();
        match &event {
            RunEventKind::Retry { new_messages, .. } => {
                assert_eq!(new_messages.len(), 2);
                assert_eq!(new_messages[0].text_content().as_deref(), Some("just text"));
            }
            other => panic!("unexpected event: {}", other.name()),
        }
        ctx.apply(&event);

        let event = generating_step_logic(&ctx, &deps).await.unwrap();
        match event {
            RunEventKind::StopRunByError { checkpoint, .. } => {
                assert_eq!(checkpoint.status, CheckpointStatus::StoppedByError);
            }
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let deps = deps(ScriptedLlm::new().then_error(GenerationError::Fatal("bad key".to_string())));
        let event = generating_step_logic(&context(), &deps).await.unwrap();
        assert_eq!(event.name(), "stopRunByError");
    }

    #[tokio::test]
    async fn test_transient_error_retries() {
        let deps = deps(ScriptedLlm::new().then_error(GenerationError::Transient("503".to_string())));
        let event = generating_step_logic(&context(), &deps).await.unwrap();
        assert_eq!(event.name(), "retry");
    }

    #[tokio::test]
    async fn test_run_result_covers_skipped_calls() {
        let llm = ScriptedLlm::new().then(Generation::text("final answer"));
        let deps = deps(llm);
        let mut ctx = context();
        let call = |id: &str, tool: &str| ToolCall {
            id: id.to_string(),
            skill_name: "base".to_string(),
            tool_name: tool.to_string(),
            args: serde_json::json!({}),
        };
        ctx.step.tool_calls = Some(vec![call("t", "think"), call("done", "attemptCompletion")]);
        ctx.step.tool_results = Some(vec![ToolResult::for_call(
            &call("done", "attemptCompletion"),
            vec![MessagePart::text("{}")],
        )]);

        match generating_run_result_logic(&ctx, &deps).await.unwrap() {
            RunEventKind::CompleteRun { checkpoint, text, .. } => {
                assert_eq!(text, "final answer");
                assert_eq!(checkpoint.status, CheckpointStatus::Completed);
                assert_eq!(checkpoint.last_message_text().as_deref(), Some("final answer"));
                let tool_msg = &checkpoint.messages[checkpoint.messages.len() - 2];
                assert_eq!(tool_msg.contents.len(), 2);
            }
            other => panic!("unexpected event: {}", other.name()),
        }
    }
}
