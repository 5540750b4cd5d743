//! 数据模型：Expert、Skill、RunSetting、Checkpoint、Step、消息与工具调用

pub mod checkpoint;
pub mod expert;
pub mod message;
pub mod setting;
pub mod step;
pub mod tool_call;
pub mod usage;

pub use checkpoint::{
    Checkpoint, CheckpointAction, CheckpointStatus, DelegatedBy, DelegationTarget, TodoItem,
};
pub use expert::{filter_tool_names, Expert, ExpertRef, InteractiveToolDef, Skill};
pub use message::{Message, MessageKind, MessagePart};
pub use setting::{InteractiveToolCallResult, ProviderConfig, RunInput, RunSetting};
pub use step::Step;
pub use tool_call::{ToolCall, ToolDefinition, ToolResult};
pub use usage::Usage;

/// 生成新的唯一 id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 当前时间（Unix 毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
