//! Checkpoint：单个 Expert 在步骤边界上的对话状态快照
//!
//! 终态 Checkpoint 不再修改；需要派生状态时总是 clone 后改写（见 `crate::checkpoint`）。

use serde::{Deserialize, Serialize};

use crate::model::{ExpertRef, Message, ToolCall, ToolResult, Usage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckpointStatus {
    Init,
    Proceeding,
    Completed,
    StoppedByInteractiveTool,
    StoppedByDelegate,
    StoppedByExceededMaxSteps,
    StoppedByError,
}

impl CheckpointStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Init | Self::Proceeding)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Proceeding => "proceeding",
            Self::Completed => "completed",
            Self::StoppedByInteractiveTool => "stoppedByInteractiveTool",
            Self::StoppedByDelegate => "stoppedByDelegate",
            Self::StoppedByExceededMaxSteps => "stoppedByExceededMaxSteps",
            Self::StoppedByError => "stoppedByError",
        }
    }
}

/// 产生该快照的动作
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CheckpointAction {
    Init,
    StartRun,
    ResumeToolCalls,
    ContinueToNextStep,
    CompleteRun,
    StopRunByInteractiveTool,
    StopRunByDelegate,
    StopRunByExceededMaxSteps,
    ReturnFromDelegate,
    StopRunByError { message: String },
}

/// 委派目标：由父 Expert 的一次工具调用触发
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationTarget {
    pub expert: ExpertRef,
    pub tool_call_id: String,
    pub tool_name: String,
    pub query: String,
}

/// 子运行记录的父方身份，用于把结果路由回去
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedBy {
    pub expert: ExpertRef,
    pub tool_call_id: String,
    pub tool_name: String,
    /// 父方停止时的 Checkpoint id
    pub checkpoint_id: String,
    /// 父方本身也是被委派的运行时，父方自己的 delegatedBy（返回父方时恢复）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer: Option<Box<DelegatedBy>>,
}

/// base 技能待办列表中的一项
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: u32,
    pub title: String,
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub job_id: String,
    pub run_id: String,
    pub expert: ExpertRef,
    pub step_number: u32,
    pub status: CheckpointStatus,
    pub messages: Vec<Message>,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_by: Option<DelegatedBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate_to: Option<Vec<DelegationTarget>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_tool_results: Option<Vec<ToolResult>>,
    /// 快照时刻的待办列表，续跑时交回 base 技能
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub todos: Vec<TodoItem>,
    pub action: CheckpointAction,
}

impl Checkpoint {
    /// 最后一条消息的文本内容
    pub fn last_message_text(&self) -> Option<String> {
        self.messages.last().and_then(|m| m.text_content())
    }

    /// 按当前 usage 与上下文窗口计算占用率
    pub fn with_context_window_usage(mut self) -> Self {
        self.context_window_usage = self
            .context_window
            .filter(|w| *w > 0)
            .map(|w| self.usage.input_tokens as f64 / w as f64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!CheckpointStatus::Init.is_terminal());
        assert!(!CheckpointStatus::Proceeding.is_terminal());
        assert!(CheckpointStatus::Completed.is_terminal());
        assert!(CheckpointStatus::StoppedByDelegate.is_terminal());
        assert!(CheckpointStatus::StoppedByError.is_terminal());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let v = serde_json::to_value(CheckpointStatus::StoppedByExceededMaxSteps).unwrap();
        assert_eq!(v, "stoppedByExceededMaxSteps");
        assert_eq!(
            CheckpointStatus::StoppedByExceededMaxSteps.as_str(),
            "stoppedByExceededMaxSteps"
        );
    }
}
