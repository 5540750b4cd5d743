//! Step：进行中步骤的临时工作状态（不直接持久化，在 FinishingStep 折叠进下一个 Checkpoint）

use serde::{Deserialize, Serialize};

use crate::model::{now_millis, Message, ToolCall, ToolResult, Usage};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_number: u32,
    pub input_messages: Vec<Message>,
    pub new_messages: Vec<Message>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub tool_results: Option<Vec<ToolResult>>,
    #[serde(default)]
    pub pending_tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub partial_tool_results: Option<Vec<ToolResult>>,
    pub usage: Usage,
    /// 当前步骤内已重试的生成次数
    #[serde(default)]
    pub retry_count: u32,
    pub started_at: i64,
    #[serde(default)]
    pub finished_at: Option<i64>,
}

impl Step {
    pub fn new(step_number: u32) -> Self {
        Self {
            step_number,
            input_messages: Vec::new(),
            new_messages: Vec::new(),
            tool_calls: None,
            tool_results: None,
            pending_tool_calls: None,
            partial_tool_results: None,
            usage: Usage::default(),
            retry_count: 0,
            started_at: now_millis(),
            finished_at: None,
        }
    }

    /// 生成时发送给 LLM 的本步消息（输入 + 新增）
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.input_messages.iter().chain(self.new_messages.iter())
    }
}
