//! 工具调用、工具结果与工具定义
//!
//! `id` 用于在并发执行时把调用和结果对应起来。

use serde::{Deserialize, Serialize};

use crate::model::MessagePart;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub skill_name: String,
    pub tool_name: String,
    pub args: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub id: String,
    pub skill_name: String,
    pub tool_name: String,
    pub result: Vec<MessagePart>,
}

impl ToolResult {
    pub fn for_call(call: &ToolCall, result: Vec<MessagePart>) -> Self {
        Self {
            id: call.id.clone(),
            skill_name: call.skill_name.clone(),
            tool_name: call.tool_name.clone(),
            result,
        }
    }

    /// 工具执行失败时的结果：对 Expert 来说仍是普通结果
    pub fn error(call: &ToolCall, message: impl std::fmt::Display) -> Self {
        Self::for_call(call, vec![MessagePart::text(format!("Error: {}", message))])
    }

    /// 第一段文本
    pub fn first_text(&self) -> Option<&str> {
        self.result.iter().find_map(|p| p.as_text())
    }
}

/// 暴露给生成器的工具定义
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub skill_name: String,
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub interactive: bool,
}
