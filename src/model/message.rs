//! 消息模型：Expert 对话历史
//!
//! 与 LLM API 对齐的四类消息（instruction / user / expert / tool），每条消息由若干 MessagePart 组成；
//! Checkpoint 中持久化的就是这里的结构，字段名保持 camelCase 以便外部消费者稳定读取。

use serde::{Deserialize, Serialize};

use crate::model::new_id;

/// 消息类型（序列化为 `type` 字段）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    InstructionMessage,
    UserMessage,
    ExpertMessage,
    ToolMessage,
}

/// 消息片段
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessagePart {
    #[serde(rename_all = "camelCase")]
    TextPart { text: String },
    /// base64 内联图片
    #[serde(rename_all = "camelCase")]
    ImageInlinePart {
        encoded_data: String,
        mime_type: String,
    },
    /// base64 内联文件（PDF 等）
    #[serde(rename_all = "camelCase")]
    FileInlinePart {
        encoded_data: String,
        mime_type: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCallPart {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolResultPart {
        tool_call_id: String,
        tool_name: String,
        contents: Vec<MessagePart>,
    },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextPart { text: text.into() }
    }

    /// 若为文本片段则返回文本
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::TextPart { text } => Some(text),
            _ => None,
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub contents: Vec<MessagePart>,
}

impl Message {
    pub fn new(kind: MessageKind, contents: Vec<MessagePart>) -> Self {
        Self {
            id: new_id(),
            kind,
            contents,
        }
    }

    pub fn instruction(text: impl Into<String>) -> Self {
        Self::new(MessageKind::InstructionMessage, vec![MessagePart::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageKind::UserMessage, vec![MessagePart::text(text)])
    }

    pub fn expert(contents: Vec<MessagePart>) -> Self {
        Self::new(MessageKind::ExpertMessage, contents)
    }

    pub fn expert_text(text: impl Into<String>) -> Self {
        Self::expert(vec![MessagePart::text(text)])
    }

    pub fn tool(contents: Vec<MessagePart>) -> Self {
        Self::new(MessageKind::ToolMessage, contents)
    }

    /// 拼接所有文本片段；没有文本片段时返回 None
    pub fn text_content(&self) -> Option<String> {
        let texts: Vec<&str> = self.contents.iter().filter_map(|p| p.as_text()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}
