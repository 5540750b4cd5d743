//! 步进状态机：状态枚举、转移表与上下文更新
//!
//! 转移表以 `(状态, 事件类型)` 为键；表中不存在的组合是 `RuntimeError::InvalidTransition`。
//! `RunContext::apply` 是唯一修改运行中状态（Checkpoint + Step）的地方。

use crate::events::RunEventKind;
use crate::model::{now_millis, Checkpoint, DelegationTarget, RunSetting, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Init,
    GeneratingStep,
    CallingTool,
    CallingDelegate,
    CallingInteractiveTool,
    ResolvingToolResult,
    ResolvingPdfFile,
    ResolvingImageFile,
    GeneratingRunResult,
    FinishingStep,
    Stopped,
}

impl RunState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

use RunState::*;

static TRANSITIONS: &[(RunState, &str, RunState)] = &[
    (Init, "startRun", GeneratingStep),
    (Init, "resumeToolCalls", CallingTool),
    (GeneratingStep, "callTools", CallingTool),
    (GeneratingStep, "retry", GeneratingStep),
    (GeneratingStep, "stopRunByError", Stopped),
    (CallingTool, "attemptCompletion", GeneratingRunResult),
    (CallingTool, "resolveToolResults", ResolvingToolResult),
    (CallingTool, "resolvePdfFile", ResolvingPdfFile),
    (CallingTool, "resolveImageFile", ResolvingImageFile),
    (CallingTool, "callDelegate", CallingDelegate),
    (CallingTool, "callInteractiveTool", CallingInteractiveTool),
    (CallingDelegate, "stopRunByDelegate", Stopped),
    (CallingInteractiveTool, "stopRunByInteractiveTool", Stopped),
    (ResolvingToolResult, "finishToolCalls", FinishingStep),
    (ResolvingPdfFile, "finishToolCalls", FinishingStep),
    (ResolvingImageFile, "finishToolCalls", FinishingStep),
    (GeneratingRunResult, "completeRun", Stopped),
    (GeneratingRunResult, "retry", GeneratingRunResult),
    (GeneratingRunResult, "stopRunByError", Stopped),
    (FinishingStep, "continueToNextStep", GeneratingStep),
    (FinishingStep, "stopRunByExceededMaxSteps", Stopped),
];

pub fn next_state(state: RunState, event: &str) -> Option<RunState> {
    TRANSITIONS
        .iter()
        .find(|(from, name, _)| *from == state && *name == event)
        .map(|(_, _, to)| *to)
}

/// 一次运行的工作状态
#[derive(Debug, Clone)]
pub struct RunContext {
    pub setting: RunSetting,
    pub checkpoint: Checkpoint,
    pub step: Step,
    /// callDelegate 选出的目标，CallingDelegate 写入停止快照
    pub delegate_to: Vec<DelegationTarget>,
}

impl RunContext {
    pub fn new(setting: RunSetting, checkpoint: Checkpoint) -> Self {
        let step = step_for(&checkpoint);
        Self {
            setting,
            checkpoint,
            step,
            delegate_to: Vec::new(),
        }
    }

    pub fn apply(&mut self, event: &RunEventKind) {
        match event {
            RunEventKind::StartRun { checkpoint, .. } => {
                self.checkpoint = checkpoint.clone();
                self.step = step_for(checkpoint);
            }
            RunEventKind::ResumeToolCalls {
                checkpoint,
                pending_tool_calls,
                partial_tool_results,
            } => {
                self.checkpoint = checkpoint.clone();
                self.step = step_for(checkpoint);
                self.step.tool_calls = Some(pending_tool_calls.clone());
                self.step.pending_tool_calls = Some(pending_tool_calls.clone());
                self.step.partial_tool_results = Some(partial_tool_results.clone());
            }
            RunEventKind::Retry {
                new_messages, usage, ..
            } => {
                self.step.new_messages.extend(new_messages.iter().cloned());
                self.step.usage += *usage;
                self.step.retry_count += 1;
            }
            RunEventKind::CallTools {
                new_message,
                tool_calls,
                usage,
            } => {
                self.step.new_messages.push(new_message.clone());
                self.step.tool_calls = Some(tool_calls.clone());
                self.step.pending_tool_calls = Some(tool_calls.clone());
                self.step.usage += *usage;
                self.step.retry_count = 0;
            }
            RunEventKind::CallDelegate {
                delegate_to,
                pending_tool_calls,
                partial_tool_results,
            } => {
                self.delegate_to = delegate_to.clone();
                self.step.pending_tool_calls = Some(pending_tool_calls.clone());
                self.step.partial_tool_results = Some(partial_tool_results.clone());
            }
            RunEventKind::CallInteractiveTool {
                pending_tool_calls,
                partial_tool_results,
            } => {
                self.step.pending_tool_calls = Some(pending_tool_calls.clone());
                self.step.partial_tool_results = Some(partial_tool_results.clone());
            }
            RunEventKind::AttemptCompletion { tool_result } => {
                self.step.tool_results = Some(vec![tool_result.clone()]);
                self.step.retry_count = 0;
            }
            RunEventKind::ResolveToolResults { tool_results }
            | RunEventKind::ResolvePdfFile { tool_results }
            | RunEventKind::ResolveImageFile { tool_results } => {
                self.step.tool_results = Some(tool_results.clone());
                self.step.pending_tool_calls = None;
            }
            RunEventKind::FinishToolCalls { new_messages } => {
                self.step.new_messages.extend(new_messages.iter().cloned());
            }
            RunEventKind::ContinueToNextStep { checkpoint } => {
                self.step.finished_at = Some(now_millis());
                self.checkpoint = checkpoint.clone();
                self.step = step_for(checkpoint);
            }
            RunEventKind::CompleteRun { checkpoint, .. }
            | RunEventKind::StopRunByInteractiveTool { checkpoint }
            | RunEventKind::StopRunByDelegate { checkpoint }
            | RunEventKind::StopRunByExceededMaxSteps { checkpoint }
            | RunEventKind::StopRunByError { checkpoint, .. } => {
                self.checkpoint = checkpoint.clone();
                self.step.finished_at = Some(now_millis());
            }
        }
    }
}

/// 新步骤：输入消息即快照中的历史
fn step_for(checkpoint: &Checkpoint) -> Step {
    let mut step = Step::new(checkpoint.step_number);
    step.input_messages = checkpoint.messages.clone();
    step
}
